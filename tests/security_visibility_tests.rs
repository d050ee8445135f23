use catalogdb::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

fn open_engine(temp_dir: &TempDir, tree: Arc<MemoryTree>) -> CatalogEngine {
    CatalogEngine::open(
        EngineConfig::new(temp_dir.path()),
        tree,
        IndexerRegistry::new(),
        PermissionPolicy::default().with_role("Analyst"),
    )
    .unwrap()
}

fn install_catalog(engine: &CatalogEngine) {
    engine
        .schema()
        .setup_catalogs(&[CatalogSpec::new("samples")
            .index("state", IndexKind::Field)
            .index("allowed_principals", IndexKind::Keyword)])
        .unwrap();
}

fn visible_to(engine: &CatalogEngine, principal: &str) -> Vec<ObjectRef> {
    engine
        .store()
        .query_refs(
            "samples",
            &Query::new().eq("allowed_principals", Value::text(principal)),
        )
        .unwrap()
}

#[tokio::test]
async fn test_subtree_inherits_until_the_nearest_override() {
    let temp_dir = TempDir::new().unwrap();
    let tree = Arc::new(MemoryTree::new());
    let clients = tree.insert(
        SourceObject::new("folder")
            .with_role("alice", "Analyst")
            .with_security_override(),
    );
    let batch = tree.insert(SourceObject::new("batch").with_parent(clients));
    let sealed = tree.insert(
        SourceObject::new("batch")
            .with_parent(clients)
            .with_role("bob", "Analyst")
            .with_security_override(),
    );
    let nested = tree.insert(SourceObject::new("sample").with_parent(sealed));

    let engine = open_engine(&temp_dir, tree);
    install_catalog(&engine);
    let ctx = engine.context();
    ctx.reindexer
        .clear_find_and_rebuild("samples", &ctx.cancel)
        .await
        .unwrap();

    let alice = visible_to(&engine, "user:alice");
    assert!(alice.contains(&clients));
    assert!(alice.contains(&batch));
    assert!(!alice.contains(&sealed));
    assert!(!alice.contains(&nested));

    let bob = visible_to(&engine, "user:bob");
    assert_eq!(
        {
            let mut expected = vec![sealed, nested];
            expected.sort();
            expected
        },
        bob
    );

    // Holders of a view role see everything regardless of assignments.
    assert_eq!(visible_to(&engine, "role:Manager").len(), 4);
}

#[tokio::test]
async fn test_recompute_follows_role_changes() {
    let temp_dir = TempDir::new().unwrap();
    let tree = Arc::new(MemoryTree::new());
    let folder = tree.insert(
        SourceObject::new("folder")
            .with_role("alice", "Analyst")
            .with_security_override(),
    );
    let sample = tree.insert(SourceObject::new("sample").with_parent(folder));

    let engine = open_engine(&temp_dir, tree.clone());
    install_catalog(&engine);
    let ctx = engine.context();
    ctx.reindexer
        .clear_find_and_rebuild("samples", &ctx.cancel)
        .await
        .unwrap();
    assert_eq!(visible_to(&engine, "user:alice").len(), 2);

    // Reassign the folder to carol and propagate.
    tree.set_role_assignments(&folder, vec![RoleAssignment::new("carol", "Analyst")], false);
    let report = engine
        .security()
        .recompute(engine.store(), &folder, true, &ctx.cancel)
        .unwrap();
    assert_eq!(report.visited, 2);
    assert_eq!(report.updated, 2);

    assert!(visible_to(&engine, "user:alice").is_empty());
    let carol = visible_to(&engine, "user:carol");
    assert_eq!(
        {
            let mut expected = vec![folder, sample];
            expected.sort();
            expected
        },
        carol
    );
}

#[tokio::test]
async fn test_recompute_mid_tree_respects_tokens_above() {
    let temp_dir = TempDir::new().unwrap();
    let tree = Arc::new(MemoryTree::new());
    let root = tree.insert(
        SourceObject::new("folder")
            .with_role("alice", "Analyst")
            .with_security_override(),
    );
    let middle = tree.insert(SourceObject::new("batch").with_parent(root));
    let leaf = tree.insert(SourceObject::new("sample").with_parent(middle));

    let engine = open_engine(&temp_dir, tree);
    install_catalog(&engine);
    let ctx = engine.context();
    ctx.reindexer
        .clear_find_and_rebuild("samples", &ctx.cancel)
        .await
        .unwrap();

    // Walking only the middle subtree still inherits from the root.
    let report = engine
        .security()
        .recompute(engine.store(), &middle, true, &ctx.cancel)
        .unwrap();
    assert_eq!(report.visited, 2);

    let alice = visible_to(&engine, "user:alice");
    assert!(alice.contains(&middle));
    assert!(alice.contains(&leaf));
}

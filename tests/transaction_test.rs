use decanter::{
    ConnectionHandle, Context, CreateModel, Database, Error, GetModel, ListModel, ModelStore, PkModel,
    ScanTarget, TargetMap, TransactionManager, ValueMap,
};

#[derive(Debug, Clone, Default, PartialEq)]
struct Item {
    id: i64,
    name: String,
}

impl PkModel for Item {
    fn pk_column_map(&self) -> ValueMap {
        ValueMap::from([("id", self.id.into())])
    }
}

impl ListModel for Item {
    fn list_column_map(&mut self) -> TargetMap<'_> {
        TargetMap::from([
            ("id", &mut self.id as &mut dyn ScanTarget),
            ("name", &mut self.name as &mut dyn ScanTarget),
        ])
    }
}

impl GetModel for Item {}

impl CreateModel for Item {
    fn create_column_map(&self) -> ValueMap {
        ValueMap::from([("name", self.name.as_str().into())])
    }

    fn returning_column_map(&mut self) -> TargetMap<'_> {
        TargetMap::from([("id", &mut self.id as &mut dyn ScanTarget)])
    }
}

async fn setup() -> Result<Database, Box<dyn std::error::Error>> {
    let _ = env_logger::builder().is_test(true).try_init();
    // a single pooled connection: the transaction and later pool reads share it
    let db = Database::builder().max_connections(1).connect("sqlite::memory:").await?;
    db.raw("CREATE TABLE tests (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)").execute().await?;
    Ok(db)
}

async fn fetch_by_id(db: &Database, id: i64) -> Result<Option<Item>, Box<dyn std::error::Error>> {
    let store = ModelStore::new(db.clone(), "tests");
    let mut item = Item { id, ..Item::default() };
    Ok(if store.get(&mut item).await? { Some(item) } else { None })
}

#[tokio::test]
async fn test_tx_fn_commits_on_success() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let manager = TransactionManager::new(db.clone());

    let id = manager
        .tx_fn(&Context::new(), |ctx| {
            let con = manager.get_connection(ctx);
            Box::pin(async move {
                let store = ModelStore::new(con, "tests");
                let mut item = Item { name: "A".to_string(), ..Item::default() };
                store.create(&mut item).await?;
                Ok(item.id)
            })
        })
        .await?;

    let fetched = fetch_by_id(&db, id).await?;
    assert_eq!(fetched, Some(Item { id, name: "A".to_string() }));

    Ok(())
}

#[tokio::test]
async fn test_tx_fn_rolls_back_on_error() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let manager = TransactionManager::new(db.clone());

    let result = manager
        .tx_fn(&Context::new(), |ctx| {
            let con = manager.get_connection(ctx);
            Box::pin(async move {
                let store = ModelStore::new(con, "tests");
                let mut item = Item { name: "doomed".to_string(), ..Item::default() };
                store.create(&mut item).await?;
                Err::<(), Error>(Error::Build("boom".to_string()))
            })
        })
        .await;

    assert!(matches!(result, Err(Error::TxFunction(_))));
    assert_eq!(fetch_by_id(&db, 1).await?, None, "the insert must be rolled back");

    Ok(())
}

#[tokio::test]
async fn test_nested_tx_fn_reuses_the_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let manager = TransactionManager::new(db.clone());

    // The inner tx_fn joins the outer transaction and, on success, commits
    // it — so the outer commit finds the transaction already closed. That
    // sharp edge is part of the contract.
    let inner_manager = manager.clone();
    let result = manager
        .tx_fn(&Context::new(), move |ctx| {
            let inner_ctx = ctx.clone();
            Box::pin(async move {
                inner_manager
                    .tx_fn(&inner_ctx, |ctx| {
                        let con = inner_manager.get_connection(ctx);
                        Box::pin(async move {
                            let store = ModelStore::new(con, "tests");
                            let mut item = Item { name: "nested".to_string(), ..Item::default() };
                            store.create(&mut item).await
                        })
                    })
                    .await?;
                Ok(())
            })
        })
        .await;

    assert!(matches!(result, Err(Error::TxClosed)));
    // the inner commit already persisted the row
    assert_eq!(fetch_by_id(&db, 1).await?, Some(Item { id: 1, name: "nested".to_string() }));

    Ok(())
}

#[tokio::test]
async fn test_nested_tx_fn_error_rolls_back_shared_transaction()
-> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let manager = TransactionManager::new(db.clone());

    let inner_manager = manager.clone();
    let result = manager
        .tx_fn(&Context::new(), move |ctx| {
            let con = inner_manager.get_connection(ctx);
            let inner_ctx = ctx.clone();
            Box::pin(async move {
                let store = ModelStore::new(con, "tests");
                let mut item = Item { name: "outer".to_string(), ..Item::default() };
                store.create(&mut item).await?;

                inner_manager
                    .tx_fn(&inner_ctx, |_ctx| {
                        Box::pin(async move { Err::<(), Error>(Error::Build("inner boom".to_string())) })
                    })
                    .await?;
                Ok(())
            })
        })
        .await;

    assert!(matches!(result, Err(Error::TxFunction(_))));
    // the inner rollback aborted the outer insert too
    assert_eq!(fetch_by_id(&db, 1).await?, None);

    Ok(())
}

#[tokio::test]
async fn test_get_connection_without_transaction_is_the_pool() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let manager = TransactionManager::new(db.clone());

    let con = manager.get_connection(&Context::new());
    assert!(matches!(con, ConnectionHandle::Pool(_)));

    // usable directly, outside any transaction
    let store = ModelStore::new(con, "tests");
    let mut item = Item { name: "plain".to_string(), ..Item::default() };
    store.create(&mut item).await?;
    assert_eq!(fetch_by_id(&db, item.id).await?, Some(Item { id: item.id, name: "plain".to_string() }));

    Ok(())
}

#[tokio::test]
async fn test_handle_outliving_its_transaction_errors() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    let manager = TransactionManager::new(db.clone());

    let mut leaked: Option<ConnectionHandle> = None;
    manager
        .tx_fn(&Context::new(), |ctx| {
            leaked = Some(manager.get_connection(ctx));
            Box::pin(async move { Ok::<(), Error>(()) })
        })
        .await?;

    let store = ModelStore::new(leaked.expect("handle captured in tx_fn"), "tests");
    let mut item = Item { id: 1, ..Item::default() };
    let err = store.get(&mut item).await.unwrap_err();
    assert!(matches!(err, Error::Query(_)));

    Ok(())
}

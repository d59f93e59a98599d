use std::collections::HashMap;

use decanter::{
    CreateModel, Database, Error, ListModel, ListParams, ModelStore, ScanTarget, SelectBuilder,
    TargetMap, ValueMap,
};

#[derive(Debug, Clone, Default, PartialEq)]
struct Item {
    id: i64,
    name: String,
    // Use i64 instead of bool for SQLite Any driver compatibility in tests
    flag: i64,
}

impl ListModel for Item {
    fn list_column_map(&mut self) -> TargetMap<'_> {
        TargetMap::from([
            ("id", &mut self.id as &mut dyn ScanTarget),
            ("name", &mut self.name as &mut dyn ScanTarget),
            ("flag", &mut self.flag as &mut dyn ScanTarget),
        ])
    }

    fn default_sort_columns(&self) -> Vec<String> {
        vec!["id".to_string()]
    }
}

impl CreateModel for Item {
    fn create_column_map(&self) -> ValueMap {
        ValueMap::from([("name", self.name.as_str().into()), ("flag", self.flag.into())])
    }
}

/// Same table, but the interceptor pins the query to flag = 1 rows.
#[derive(Debug, Default)]
struct ActiveItem {
    id: i64,
    name: String,
    flag: i64,
}

impl ListModel for ActiveItem {
    fn list_column_map(&mut self) -> TargetMap<'_> {
        TargetMap::from([
            ("id", &mut self.id as &mut dyn ScanTarget),
            ("name", &mut self.name as &mut dyn ScanTarget),
            ("flag", &mut self.flag as &mut dyn ScanTarget),
        ])
    }

    fn default_sort_columns(&self) -> Vec<String> {
        vec!["id".to_string()]
    }

    fn list_interceptor(&self, qb: SelectBuilder, _params: &ListParams) -> SelectBuilder {
        qb.where_expr("flag = ?", vec![1i64.into()])
    }
}

async fn setup(rows: &[(&str, i64)]) -> Result<Database, Box<dyn std::error::Error>> {
    let _ = env_logger::builder().is_test(true).try_init();
    let db = Database::builder().max_connections(1).connect("sqlite::memory:").await?;
    db.raw("CREATE TABLE tests (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, flag INTEGER)")
        .execute()
        .await?;

    let store = ModelStore::new(db.clone(), "tests");
    for (name, flag) in rows {
        let mut item = Item { name: (*name).to_string(), flag: *flag, ..Item::default() };
        store.create(&mut item).await?;
    }

    Ok(db)
}

#[tokio::test]
async fn test_equality_and_expression_filters() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup(&[("A", 1), ("B", 0), ("C", 1)]).await?;
    let store = ModelStore::new(db.clone(), "tests");

    let (items, _) = store
        .list::<Item>(&ListParams {
            conditions: HashMap::from([("flag".to_string(), 1i64.into())]),
            ..ListParams::default()
        })
        .await?;
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.flag == 1));

    let (items, _) = store
        .list::<Item>(&ListParams {
            condition_expressions: vec![("name != ?".to_string(), vec!["B".into()])],
            ..ListParams::default()
        })
        .await?;
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.name != "B"));

    Ok(())
}

#[tokio::test]
async fn test_list_count_agreement() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup(&[("A", 1), ("B", 0), ("C", 1), ("D", 1)]).await?;
    let store = ModelStore::new(db.clone(), "tests");

    let filter = ListParams {
        conditions: HashMap::from([("flag".to_string(), 1i64.into())]),
        only_count: true,
        ..ListParams::default()
    };
    let (items, count) = store.list::<Item>(&filter).await?;
    assert!(items.is_empty(), "only_count never fetches rows");
    assert_eq!(count, 3);

    let (items, total) = store
        .list::<Item>(&ListParams {
            conditions: HashMap::from([("flag".to_string(), 1i64.into())]),
            with_total_count: true,
            page_size: 100,
            ..ListParams::default()
        })
        .await?;
    assert_eq!(total, count);
    assert_eq!(items.len() as i64, total);

    Ok(())
}

#[tokio::test]
async fn test_pagination_partitions_the_result_set() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup(&[("A", 1), ("B", 1), ("C", 1), ("D", 1), ("E", 1)]).await?;
    let store = ModelStore::new(db.clone(), "tests");

    let (all, _) = store.list::<Item>(&ListParams::default()).await?;
    assert_eq!(all.len(), 5);

    let mut pages = Vec::new();
    for page in 0..3 {
        let (items, _) =
            store.list::<Item>(&ListParams { page, page_size: 2, ..ListParams::default() }).await?;
        pages.extend(items);
    }
    assert_eq!(pages, all);

    // past the end: empty, not an error
    let (items, _) =
        store.list::<Item>(&ListParams { page: 9, page_size: 2, ..ListParams::default() }).await?;
    assert!(items.is_empty());

    // page size 0 is unbounded, whatever the page number says
    let (items, _) =
        store.list::<Item>(&ListParams { page: 3, page_size: 0, ..ListParams::default() }).await?;
    assert_eq!(items.len(), 5);

    Ok(())
}

#[tokio::test]
async fn test_sort_precedence() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup(&[("C", 1), ("A", 1), ("B", 1)]).await?;
    let store = ModelStore::new(db.clone(), "tests");

    // None: model default (id asc, i.e. insertion order)
    let (items, _) = store.list::<Item>(&ListParams::default()).await?;
    let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["C", "A", "B"]);

    // explicit sort wins over the default
    let (items, _) = store
        .list::<Item>(&ListParams { sort: Some(vec!["name desc".to_string()]), ..ListParams::default() })
        .await?;
    let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["C", "B", "A"]);

    // explicit empty sort means no ORDER BY even though a default exists
    let (items, _) =
        store.list::<Item>(&ListParams { sort: Some(Vec::new()), ..ListParams::default() }).await?;
    assert_eq!(items.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_column_allow_list() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup(&[("A", 1)]).await?;
    let store = ModelStore::new(db.clone(), "tests");

    let (items, _) = store
        .list::<Item>(&ListParams {
            columns: vec!["name".to_string(), "bogus".to_string()],
            ..ListParams::default()
        })
        .await?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "A");
    // unselected columns keep their defaults
    assert_eq!(items[0].id, 0);
    assert_eq!(items[0].flag, 0);

    // an allow-list that survives filtering with nothing left is a hard error
    let err = store
        .list::<Item>(&ListParams { columns: vec!["bogus".to_string()], ..ListParams::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoColumns));

    Ok(())
}

#[tokio::test]
async fn test_distinct_count() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup(&[("A", 1), ("A", 1), ("B", 1)]).await?;
    let store = ModelStore::new(db.clone(), "tests");

    let (_, count) = store
        .list::<Item>(&ListParams {
            distinct: true,
            columns: vec!["name".to_string()],
            only_count: true,
            ..ListParams::default()
        })
        .await?;
    assert_eq!(count, 2);

    let (items, _) = store
        .list::<Item>(&ListParams {
            distinct: true,
            columns: vec!["name".to_string()],
            sort: Some(vec!["name".to_string()]),
            ..ListParams::default()
        })
        .await?;
    let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["A", "B"]);

    Ok(())
}

#[tokio::test]
async fn test_list_interceptor_applies_to_rows_and_count() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup(&[("A", 1), ("B", 0), ("C", 1)]).await?;
    let store = ModelStore::new(db.clone(), "tests");

    let (items, total) = store
        .list::<ActiveItem>(&ListParams { with_total_count: true, ..ListParams::default() })
        .await?;
    assert_eq!(total, 2);
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.flag == 1));

    Ok(())
}

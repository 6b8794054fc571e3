use canopy_gateway::{AccessMode, ScopedQueryHandle};
use canopy_storage::{
    DuckDbExecutor, ExecuteOptions, QueryExecutor, ScriptStatement, StorageError,
};
use canopy_types::{ExtensionId, PermissionContext, PrivateSchema};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

async fn setup() -> (Arc<DuckDbExecutor>, ScopedQueryHandle) {
    let db = Arc::new(DuckDbExecutor::open_in_memory().unwrap());
    db.execute(
        "CREATE TABLE accounts (id INTEGER, name VARCHAR);
         INSERT INTO accounts VALUES (1, 'checking');
         CREATE TABLE secrets (v VARCHAR);
         INSERT INTO secrets VALUES ('hunter2');
         CREATE SCHEMA plugin_x;",
        &[],
        &ExecuteOptions::write(),
    )
    .await
    .unwrap();

    let ctx = PermissionContext::new(
        ExtensionId::parse("x").unwrap(),
        PrivateSchema::explicit("plugin_x").unwrap(),
        vec!["accounts".into()],
        vec![],
    );
    let handle = ScopedQueryHandle::new(ctx, db.clone());
    (db, handle)
}

#[tokio::test]
async fn allowed_read_reaches_database() {
    let (_db, handle) = setup().await;
    let result = handle
        .read("SELECT name FROM accounts WHERE id = ?", &[json!(1)])
        .await
        .unwrap();
    assert_eq!(result.rows, vec![vec![json!("checking")]]);
}

#[tokio::test]
async fn denied_query_never_executes() {
    let (db, handle) = setup().await;
    let err = handle.write("DELETE FROM accounts", &[]).await.unwrap_err();
    assert!(err.is_permission_denied());
    match err {
        StorageError::PermissionDenied {
            extension_id,
            reason,
        } => {
            assert_eq!(extension_id, "x");
            assert!(reason.contains("accounts"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }

    let count = db
        .execute("SELECT COUNT(*) AS n FROM accounts", &[], &ExecuteOptions::read())
        .await
        .unwrap();
    assert_eq!(count.first_value("n"), Some(&json!(1)));
}

#[tokio::test]
async fn escape_string_read_never_reaches_database() {
    let (db, handle) = setup().await;
    let err = handle
        .read("SELECT E'\\'' AS q, v FROM secrets --'", &[])
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());

    let err = handle
        .write("SELECT E'\\''; DELETE FROM accounts --'", &[])
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());

    let count = db
        .execute("SELECT COUNT(*) AS n FROM accounts", &[], &ExecuteOptions::read())
        .await
        .unwrap();
    assert_eq!(count.first_value("n"), Some(&json!(1)));
}

#[tokio::test]
async fn own_schema_round_trip() {
    let (_db, handle) = setup().await;
    handle
        .write("CREATE TABLE plugin_x.goals (id INTEGER, title VARCHAR)", &[])
        .await
        .unwrap();
    handle
        .write(
            "INSERT INTO plugin_x.goals VALUES (?, ?)",
            &[json!(1), json!("save")],
        )
        .await
        .unwrap();
    let result = handle
        .read("SELECT title FROM plugin_x.goals", &[])
        .await
        .unwrap();
    assert_eq!(result.rows, vec![vec![json!("save")]]);
}

#[tokio::test]
async fn readonly_call_with_write_is_denied_by_gateway() {
    let (_db, handle) = setup().await;
    let err = handle
        .read("CREATE TABLE plugin_x.t (v INTEGER)", &[])
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());
}

#[tokio::test]
async fn script_is_checked_statement_by_statement() {
    let (db, handle) = setup().await;
    let err = handle
        .execute_script(
            &[
                ScriptStatement::new("CREATE TABLE plugin_x.ok (v INTEGER)"),
                ScriptStatement::new("DROP TABLE secrets"),
            ],
            &ExecuteOptions::write(),
        )
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());

    // Nothing ran: the first statement was not executed either.
    let tables = db
        .execute(
            "SELECT COUNT(*) AS n FROM information_schema.tables WHERE table_name = 'ok'",
            &[],
            &ExecuteOptions::read(),
        )
        .await
        .unwrap();
    assert_eq!(tables.first_value("n"), Some(&json!(0)));
}

#[test]
fn check_is_synchronous() {
    let db: Arc<dyn QueryExecutor> = Arc::new(DuckDbExecutor::open_in_memory().unwrap());
    let handle = ScopedQueryHandle::new(
        PermissionContext::private_only(ExtensionId::parse("x").unwrap()),
        db,
    );
    assert!(handle.check("SELECT * FROM plugin_x.t", AccessMode::Read).is_ok());
    assert!(handle.check("SELECT * FROM accounts", AccessMode::Read).is_err());
    assert_eq!(handle.context().private_schema.as_str(), "plugin_x");
}

//! Report execution through the mock renderer

mod common;

use axum::http::{header, Method, StatusCode};
use serde_json::json;

use reportdesk_core::models::{DbConnection, OutputFormat, ResolvedData};
use reportdesk_core::RenderedReport;

use common::TestApp;

#[tokio::test]
async fn execute_returns_rendered_document() {
    let app = TestApp::new().await;
    let (_, token) = app.register("ada@example.com").await;
    let ds = app.inline_data_source(&token, "Regions").await;
    app.create_report(&token, "Sales", ds).await;

    let reply = app
        .json(
            Method::POST,
            "/api/reports/execute",
            Some(&token),
            json!({
                "report_slug": "sales",
                "data_source_id": ds,
                "format": "pdf",
                "parameters": {"title": "Q1"}
            }),
        )
        .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.header(header::CONTENT_TYPE), "application/pdf");
    assert_eq!(
        reply.header(header::CONTENT_DISPOSITION),
        "inline; filename=\"sales.pdf\""
    );
    assert_eq!(reply.bytes, b"rendered pdf");

    let requests = app.renderer.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].format, OutputFormat::Pdf);
    assert_eq!(requests[0].parameters["title"], "Q1");
    assert_eq!(requests[0].parameters["type"], "pdf");
    assert_eq!(
        requests[0].data,
        ResolvedData::Inline(json!([
            {"region": "north", "total": 10},
            {"region": "south", "total": 7}
        ]))
    );
}

#[tokio::test]
async fn json_data_overrides_stored_inline_data() {
    let app = TestApp::new().await;
    let (_, token) = app.register("ada@example.com").await;
    let ds = app.inline_data_source(&token, "Regions").await;
    let report = app.create_report(&token, "Sales", ds).await;

    let reply = app
        .json(
            Method::POST,
            "/api/reports/execute",
            Some(&token),
            json!({
                "report_id": report["id"],
                "data_source_slug": "regions",
                "format": "html",
                "json_data": [{"region": "east", "total": 3}]
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let requests = app.renderer.requests();
    assert_eq!(
        requests[0].data,
        ResolvedData::Inline(json!([{"region": "east", "total": 3}]))
    );
}

#[tokio::test]
async fn attached_source_is_not_used_without_reference() {
    let app = TestApp::new().await;
    let (_, token) = app.register("ada@example.com").await;
    let warehouse = app
        .create_data_source(
            &token,
            json!({"name": "Warehouse", "type": "mysql", "configuration": {"host": "db"}}),
        )
        .await;
    let report = app
        .create_report(&token, "Sales", warehouse["id"].as_i64().unwrap())
        .await;

    let reply = app
        .json(
            Method::POST,
            "/api/reports/execute",
            Some(&token),
            json!({"report_id": report["id"], "format": "pdf", "json_data": [{"n": 1}]}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let requests = app.renderer.requests();
    assert_eq!(requests[0].data, ResolvedData::Inline(json!([{"n": 1}])));
}

#[tokio::test]
async fn no_data_source_and_no_json_data_renders_empty_set() {
    let app = TestApp::new().await;
    let (_, token) = app.register("ada@example.com").await;
    let ds = app.inline_data_source(&token, "Regions").await;
    app.create_report(&token, "Sales", ds).await;

    let reply = app
        .json(
            Method::POST,
            "/api/reports/execute",
            Some(&token),
            json!({"report_slug": "sales", "format": "txt"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(app.renderer.requests()[0].data, ResolvedData::Inline(json!([])));
}

#[tokio::test]
async fn explicit_ids_match_ids_only() {
    let app = TestApp::new().await;
    let (_, ada) = app.register("ada@example.com").await;
    let (_, bob) = app.register("bob@example.com").await;
    let ds = app.inline_data_source(&ada, "Regions").await;
    let report = app.create_report(&ada, "Sales", ds).await;
    let id = report["id"].as_i64().unwrap();

    // Bob's records are named after Ada's ids
    let bob_ds = app
        .create_data_source(
            &bob,
            json!({"name": ds.to_string(), "type": "json", "configuration": [{"owner": "bob"}]}),
        )
        .await["id"]
        .as_i64()
        .unwrap();
    app.create_report(&bob, &id.to_string(), bob_ds).await;

    let reply = app
        .json(
            Method::POST,
            "/api/reports/execute",
            Some(&ada),
            json!({"report_id": id, "data_source_id": ds, "format": "pdf"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let requests = app.renderer.requests();
    assert_eq!(
        requests[0].data,
        ResolvedData::Inline(json!([
            {"region": "north", "total": 10},
            {"region": "south", "total": 7}
        ]))
    );
}

#[tokio::test]
async fn render_request_carries_report_resource_dir() {
    let app = TestApp::new().await;
    let (user_id, token) = app.register("ada@example.com").await;
    let ds = app.inline_data_source(&token, "Regions").await;
    let first = app.create_report(&token, "Sales", ds).await;
    let second = app.create_report(&token, "Stock", ds).await;

    for slug in ["sales", "stock"] {
        let reply = app
            .json(
                Method::POST,
                "/api/reports/execute",
                Some(&token),
                json!({"report_slug": slug, "format": "txt"}),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    let requests = app.renderer.requests();
    let root = app.state.storage.root();
    for (request, report) in requests.iter().zip([&first, &second]) {
        let report_id = report["id"].as_i64().unwrap();
        let expected = root.join(format!("reports/user_{user_id}/report_{report_id}"));
        assert_eq!(request.resource_dir, expected);
        assert_eq!(request.template, expected.join("sales.jrxml"));
    }
}

#[tokio::test]
async fn unsupported_format_never_reaches_renderer() {
    let app = TestApp::new().await;
    let (_, token) = app.register("ada@example.com").await;
    let ds = app.inline_data_source(&token, "Regions").await;
    app.create_report(&token, "Sales", ds).await;

    let reply = app
        .json(
            Method::POST,
            "/api/reports/execute",
            Some(&token),
            json!({"report_slug": "sales", "format": "pptx"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(reply.json()["errors"]["format"].is_array());

    let missing = app
        .json(
            Method::POST,
            "/api/reports/execute",
            Some(&token),
            json!({"report_slug": "sales"}),
        )
        .await;
    assert_eq!(missing.status, StatusCode::UNPROCESSABLE_ENTITY);

    assert!(app.renderer.requests().is_empty());
}

#[tokio::test]
async fn execute_checks_report_access() {
    let app = TestApp::new().await;
    let (_, ada) = app.register("ada@example.com").await;
    let (_, bob) = app.register("bob@example.com").await;
    let ds = app.inline_data_source(&ada, "Regions").await;
    app.create_report(&ada, "Sales", ds).await;

    let unknown = app
        .json(
            Method::POST,
            "/api/reports/execute",
            Some(&ada),
            json!({"report_slug": "missing", "format": "pdf"}),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let foreign = app
        .json(
            Method::POST,
            "/api/reports/execute",
            Some(&bob),
            json!({"report_slug": "sales", "format": "pdf"}),
        )
        .await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);

    let no_key = app
        .json(
            Method::POST,
            "/api/reports/execute",
            Some(&ada),
            json!({"format": "pdf"}),
        )
        .await;
    assert_eq!(no_key.status, StatusCode::UNPROCESSABLE_ENTITY);

    assert!(app.renderer.requests().is_empty());
}

#[tokio::test]
async fn foreign_or_missing_data_source_is_forbidden() {
    let app = TestApp::new().await;
    let (_, ada) = app.register("ada@example.com").await;
    let (_, bob) = app.register("bob@example.com").await;
    let ds = app.inline_data_source(&ada, "Regions").await;
    let bobs = app.inline_data_source(&bob, "Bob data").await;
    app.create_report(&ada, "Sales", ds).await;

    for body in [
        json!({"report_slug": "sales", "format": "pdf", "data_source_id": bobs}),
        json!({"report_slug": "sales", "format": "pdf", "data_source_slug": "no-such-source"}),
    ] {
        let reply = app
            .json(Method::POST, "/api/reports/execute", Some(&ada), body)
            .await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN);
        assert_eq!(
            reply.json()["message"],
            "Data Source Unauthorized or Not Found"
        );
    }
    assert!(app.renderer.requests().is_empty());
}

#[tokio::test]
async fn database_source_passes_connection() {
    let app = TestApp::new().await;
    let (_, token) = app.register("ada@example.com").await;
    let inline = app.inline_data_source(&token, "Regions").await;
    app.create_report(&token, "Sales", inline).await;
    app.create_data_source(
        &token,
        json!({
            "name": "Warehouse",
            "type": "mysql",
            "configuration": {
                "host": "db.internal",
                "port": 3306,
                "database": "sales",
                "username": "report",
                "password": "secret"
            }
        }),
    )
    .await;

    let reply = app
        .json(
            Method::POST,
            "/api/reports/execute",
            Some(&token),
            json!({
                "report_slug": "sales",
                "data_source_slug": "warehouse",
                "format": "xlsx",
                "json_data": [{"ignored": true}]
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.header(header::CONTENT_TYPE),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );

    let requests = app.renderer.requests();
    let ResolvedData::Database(conn) = &requests[0].data else {
        panic!("expected database data, got {:?}", requests[0].data);
    };
    assert_eq!(
        conn,
        &DbConnection {
            driver: "mysql".into(),
            host: Some("db.internal".into()),
            port: Some(3306),
            database: Some("sales".into()),
            username: Some("report".into()),
            password: Some("secret".into()),
        }
    );
}

#[tokio::test]
async fn render_failure_is_reported() {
    let app = TestApp::new().await;
    let (_, token) = app.register("ada@example.com").await;
    let ds = app.inline_data_source(&token, "Regions").await;
    app.create_report(&token, "Sales", ds).await;
    app.renderer.add_failure("net.sf.jasperreports.engine.JRException: bad field");

    let reply = app
        .json(
            Method::POST,
            "/api/reports/execute",
            Some(&token),
            json!({"report_slug": "sales", "format": "pdf"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);

    let body = reply.json();
    assert_eq!(body["message"], "Report generation failed");
    assert!(body["error"].as_str().unwrap().contains("bad field"));
}

#[tokio::test]
async fn content_type_follows_produced_file() {
    let app = TestApp::new().await;
    let (_, token) = app.register("ada@example.com").await;
    let ds = app.inline_data_source(&token, "Regions").await;
    app.create_report(&token, "Sales", ds).await;
    app.renderer.add_response(RenderedReport {
        bytes: b"binary".to_vec(),
        extension: "jrprint".into(),
    });

    let reply = app
        .json(
            Method::POST,
            "/api/reports/execute",
            Some(&token),
            json!({"report_slug": "sales", "format": "docx"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.header(header::CONTENT_TYPE), "application/octet-stream");
    assert_eq!(
        reply.header(header::CONTENT_DISPOSITION),
        "inline; filename=\"sales.jrprint\""
    );
}

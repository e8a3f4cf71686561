mod common;

use bigip::{CallContext, ExtensionConfig, ExtensionFile, Session, WorkspaceConfig};
use common::{error_response, Appliance, FileStore};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[test]
fn test_create_workspace_and_extension() {
    let appliance = Appliance::start();
    appliance.mount(
        Mock::given(method("POST"))
            .and(path("/mgmt/tm/ilx/workspace"))
            .and(query_param("options", "extension,exampleExt"))
            .and(body_json(json!({"name": "ExampleWorkspace"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "ExampleWorkspace"})))
            .expect(1),
    );
    appliance.mount(
        Mock::given(method("POST"))
            .and(path("/mgmt/tm/ilx/workspace"))
            .and(body_json(json!({"name": "ExampleWorkspace"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "ExampleWorkspace"})))
            .expect(1),
    );

    let session = Session::basic(appliance.config()).unwrap();
    let cx = CallContext::background();

    session.create_workspace(&cx, "ExampleWorkspace").unwrap();
    let ext = ExtensionConfig::new(WorkspaceConfig::new("ExampleWorkspace", "Common"), "exampleExt");
    session.create_extension(&cx, &ext).unwrap();

    let posts = appliance.requests_to("POST", "/mgmt/tm/ilx/workspace");
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].url.query(), None);
    assert_eq!(posts[1].url.query(), Some("options=extension,exampleExt"));
}

#[test]
fn test_missing_workspace_is_none() {
    let appliance = Appliance::start();
    appliance.mount(
        Mock::given(method("GET"))
            .and(path("/mgmt/tm/ilx/workspace/nothing"))
            .respond_with(error_response(404, "01020036:3: The requested workspace (/Common/nothing) was not found.")),
    );

    let session = Session::basic(appliance.config()).unwrap();
    let workspace = session
        .get_workspace(&CallContext::background(), "nothing")
        .unwrap();
    assert_eq!(workspace, None);
}

#[test]
fn test_rule_and_extension_files_round_trip() {
    let appliance = Appliance::start();
    let store = FileStore::default();
    appliance.mount_file_store(&store);

    let session = Session::basic(appliance.config()).unwrap();
    let cx = CallContext::background();
    let ws = WorkspaceConfig::new("ExampleWorkspace", "Common");
    let ext = ExtensionConfig::new(ws.clone(), "exampleExt");

    let rule = "when HTTP_REQUEST { ILX::call $handle hello }";
    session.write_rule_file(&cx, &ws, rule, "Example.tcl").unwrap();
    session
        .write_extension_file(&cx, &ext, "module.exports = {};", ExtensionFile::IndexJs)
        .unwrap();

    assert!(store
        .get("/var/ilx/workspaces/Common/ExampleWorkspace/rules/Example.tcl")
        .is_some());

    let file = session.read_rule_file(&cx, &ws, "Example.tcl").unwrap();
    assert_eq!(file.name, "Example.tcl");
    assert_eq!(file.content, rule);

    let file = session
        .read_extension_file(&cx, &ext, ExtensionFile::IndexJs)
        .unwrap();
    assert_eq!(file.name, "index.js");
    assert_eq!(file.content, "module.exports = {};");

    let err = session
        .read_extension_file(&cx, &ext, ExtensionFile::PackageJson)
        .unwrap_err();
    assert!(err.is_not_found());
}

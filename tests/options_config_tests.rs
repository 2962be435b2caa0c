use std::io::Write;

use factory_persist::session::shared;
use factory_persist::{
    ConfigDiagnostic, FactoryError, InMemorySession, Model, ModelArgs, ModelFactory, ModelSchema,
    OptionsLayer, PersistenceMode, Record, Result, Session, SessionOpKind, Value,
};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Default, PartialEq, Model)]
#[model(table = "widget", unique(sku))]
struct Widget {
    #[column(primary_key)]
    id: Option<i64>,
    sku: String,
    label: String,
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn base_and_child_layers_load_from_files() {
    let base_file = write_config(r#"{"session_persistence": "commit", "update_existing": true}"#);
    let child_file = write_config(r#"{"session_persistence": "check"}"#);

    let (session, handle) = shared(InMemorySession::new());
    let base = OptionsLayer::from_json_file(base_file.path())
        .unwrap()
        .session(handle)
        .resolve("BaseFactory")
        .unwrap()
        .into_options();
    let child = OptionsLayer::from_json_file(child_file.path())
        .unwrap()
        .resolve_over("WidgetFactory", &base)
        .unwrap();
    assert!(child.diagnostics.is_empty());

    let factory = ModelFactory::<Widget>::from_resolution(child);
    assert_eq!(factory.options().persistence(), Some(PersistenceMode::CheckAndMerge));
    assert!(factory.options().update_existing());

    factory
        .create(ModelArgs::new().kwarg("sku", "W-1").kwarg("label", "bolt"))
        .unwrap();
    let updated = factory
        .create(ModelArgs::new().kwarg("sku", "W-1").kwarg("label", "nut"))
        .unwrap();
    assert_eq!(updated.id, Some(1));
    assert_eq!(updated.label, "nut");
    assert_eq!(session.lock().unwrap().tracked_rows("widget").len(), 1);
}

#[test]
fn invalid_mode_in_file_is_reported_against_the_factory() {
    let file = write_config(r#"{"session_persistence": "save"}"#);

    let err = OptionsLayer::from_json_file(file.path())
        .unwrap()
        .resolve("WidgetFactory")
        .unwrap_err();

    match err {
        FactoryError::InvalidPersistenceMode {
            factory,
            value,
            allowed,
        } => {
            assert_eq!(factory, "WidgetFactory");
            assert_eq!(value, "save");
            assert_eq!(allowed, "none, commit, flush, merge, check, get, add");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn deprecated_force_flush_in_file_yields_a_diagnostic() {
    let file = write_config(r#"{"force_flush": true, "session_persistence": "merge"}"#);

    let resolution = OptionsLayer::from_json_file(file.path())
        .unwrap()
        .resolve("WidgetFactory")
        .unwrap();

    assert_eq!(
        resolution.diagnostics,
        vec![ConfigDiagnostic::DeprecatedForceFlush {
            factory: "WidgetFactory".into()
        }]
    );
    assert_eq!(
        resolution.options.effective_mode(),
        Some(PersistenceMode::Flush)
    );
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = OptionsLayer::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, FactoryError::IoError(_)));
}

/// A session that knows nothing but what it has been told to return.
#[derive(Default)]
struct ScriptedSession {
    existing: Option<Record>,
    calls: Vec<SessionOpKind>,
}

impl Session for ScriptedSession {
    fn query_first(
        &mut self,
        _schema: &ModelSchema,
        _column: &str,
        _value: &Value,
    ) -> Result<Option<Record>> {
        self.calls.push(SessionOpKind::Query);
        Ok(self.existing.clone())
    }

    fn merge(&mut self, _schema: &ModelSchema, record: Record) -> Result<Record> {
        self.calls.push(SessionOpKind::Merge);
        Ok(record)
    }

    fn add(&mut self, _schema: &ModelSchema, record: Record) -> Result<Record> {
        self.calls.push(SessionOpKind::Add);
        Ok(record)
    }

    fn flush(&mut self) -> Result<()> {
        self.calls.push(SessionOpKind::Flush);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.calls.push(SessionOpKind::Commit);
        Ok(())
    }
}

#[test]
fn any_session_implementation_can_back_a_factory() {
    let existing = Widget {
        id: Some(40),
        sku: "W-9".into(),
        label: "gear".into(),
    };
    let (session, handle) = shared(ScriptedSession {
        existing: Some(existing.to_record()),
        ..ScriptedSession::default()
    });
    let factory = ModelFactory::<Widget>::new(
        OptionsLayer::new()
            .session(handle)
            .persistence(PersistenceMode::GetOrAdd)
            .resolve("WidgetFactory")
            .unwrap()
            .into_options(),
    );

    let widget = factory
        .create(ModelArgs::new().kwarg("sku", "W-9").kwarg("label", "other"))
        .unwrap();

    assert_eq!(widget, existing);
    assert_eq!(
        session.lock().unwrap().calls,
        vec![SessionOpKind::Query, SessionOpKind::Merge]
    );
}

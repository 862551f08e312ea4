//! Batch driver tests against a scratch project on disk

#[cfg(test)]
mod tests {
    use crate::config::CodemodConfig;
    use crate::error::{ERR_IO, ERR_PARSE};
    use crate::pipeline::{instrument_files, rewrite_files, rewrite_selected, strip_files, FileStatus};
    use crate::stub::{StubStatus, RUNTIME_STUB_SOURCE};
    use crate::telemetry::TelemetryAggregate;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Project {
        dir: TempDir,
        config: CodemodConfig,
    }

    impl Project {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let config = CodemodConfig {
                project_root: dir.path().to_path_buf(),
                ..CodemodConfig::default()
            };
            Project { dir, config }
        }

        fn path(&self, relative: &str) -> PathBuf {
            self.dir.path().join(relative)
        }

        fn write(&self, relative: &str, content: &str) -> PathBuf {
            let path = self.path(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn read(&self, relative: &str) -> String {
            fs::read_to_string(self.path(relative)).unwrap()
        }

        fn helper(&self) -> PathBuf {
            self.config.helper_file()
        }
    }

    fn status_code(status: &FileStatus) -> Option<&str> {
        match status {
            FileStatus::Failed(report) => Some(report.code.as_str()),
            _ => None,
        }
    }

    #[test]
    fn test_end_to_end_on_disk() {
        let project = Project::new();
        let source = "{{foo}}\n{{#bar baz=1}}hi{{/bar}}\n";
        project.write("app/templates/index.hbs", source);

        let report = instrument_files(&[project.path("app/templates")], &project.config);
        assert!(!report.has_failures());
        assert_eq!(report.written(), 1);
        assert_eq!(report.files[0].identity, "app/templates/index.hbs");
        assert_eq!(report.files[0].changes, 2);
        assert_eq!(report.stub.as_ref().map(|s| s.status), Some(StubStatus::Written));
        assert_eq!(fs::read_to_string(project.helper()).unwrap(), RUNTIME_STUB_SOURCE);

        let instrumented = project.read("app/templates/index.hbs");
        assert!(instrumented.contains(
            r#"{{#if (-probe-is-component "foo" "app/templates/index.hbs")}}{{foo}}{{else}}{{foo}}{{/if}}"#
        ));

        let telemetry =
            TelemetryAggregate::from_json(r#"[{"app/templates/index.hbs": ["foo"]}]"#).unwrap();
        let report = rewrite_files(&telemetry, &project.config);
        assert!(!report.has_failures());
        assert_eq!(report.written(), 1);
        assert_eq!(
            project.read("app/templates/index.hbs"),
            "<Foo />\n{{#bar baz=1}}hi{{/bar}}\n"
        );
    }

    #[test]
    fn test_second_instrument_run_changes_nothing() {
        let project = Project::new();
        project.write("app/templates/a.hbs", "<p>{{greeting-text}}</p>");
        let inputs = [project.path("app")];

        instrument_files(&inputs, &project.config);
        let after_first = project.read("app/templates/a.hbs");

        let report = instrument_files(&inputs, &project.config);
        assert_eq!(report.files[0].status, FileStatus::Unchanged);
        assert_eq!(report.files[0].digest_before, report.files[0].digest_after);
        assert_eq!(report.stub.as_ref().map(|s| s.status), Some(StubStatus::Unchanged));
        assert_eq!(project.read("app/templates/a.hbs"), after_first);
    }

    #[test]
    fn test_parse_failure_leaves_file_untouched_and_batch_continues() {
        let project = Project::new();
        let broken = "<div>\n  {{foo}}\n";
        let bad = project.write("app/templates/bad.hbs", broken);
        let good = project.write("app/templates/good.hbs", "{{foo}}");

        let report = instrument_files(&[bad, good], &project.config);
        assert_eq!(report.files.len(), 2);
        assert_eq!(status_code(&report.files[0].status), Some(ERR_PARSE));
        assert_eq!(report.files[1].status, FileStatus::Written);
        assert!(report.has_failures());
        assert_eq!(project.read("app/templates/bad.hbs"), broken);
    }

    #[test]
    fn test_ineligible_files_are_skipped_and_stub_untouched() {
        let project = Project::new();
        let script = project.write("app/components/thing.js", "export default {};");

        let report = instrument_files(&[script], &project.config);
        assert_eq!(report.files[0].status, FileStatus::Skipped);
        assert_eq!(report.skipped(), 1);
        assert!(report.stub.is_none());
        assert!(!project.helper().exists());
        assert_eq!(project.read("app/components/thing.js"), "export default {};");
    }

    #[test]
    fn test_directory_expansion_is_sorted_and_filtered() {
        let project = Project::new();
        project.write("app/templates/b.hbs", "b");
        project.write("app/templates/a.hbs", "a");
        project.write("app/templates/nested/c.hbs", "c");
        project.write("app/templates/readme.md", "{{foo}}");

        let report = strip_files(&[project.path("app")], &project.config);
        let identities: Vec<&str> = report.files.iter().map(|f| f.identity.as_str()).collect();
        assert_eq!(
            identities,
            vec!["app/templates/a.hbs", "app/templates/b.hbs", "app/templates/nested/c.hbs"]
        );
        assert_eq!(report.unchanged(), 3);
    }

    #[test]
    fn test_write_unchanged_rewrites_identical_output() {
        let mut project = Project::new();
        let path = project.write("app/templates/a.hbs", "{{this.title}}");

        let report = strip_files(&[path.clone()], &project.config);
        assert_eq!(report.files[0].status, FileStatus::Unchanged);

        project.config.write_unchanged = true;
        let report = strip_files(&[path], &project.config);
        assert_eq!(report.files[0].status, FileStatus::Written);
        assert_eq!(project.read("app/templates/a.hbs"), "{{this.title}}");
    }

    #[test]
    fn test_strip_files_restores_source() {
        let project = Project::new();
        let source = "{{#if @show}}{{fancy-thing a=1}}{{/if}}";
        let path = project.write("app/templates/a.hbs", source);

        instrument_files(&[path.clone()], &project.config);
        assert_ne!(project.read("app/templates/a.hbs"), source);

        let report = strip_files(&[path], &project.config);
        assert_eq!(report.files[0].changes, 1);
        assert_eq!(project.read("app/templates/a.hbs"), source);
    }

    #[test]
    fn test_rewrite_selected_ignores_unreported_names() {
        let project = Project::new();
        let a = project.write("app/templates/a.hbs", "{{foo}}");
        let b = project.write("app/templates/b.hbs", "{{foo}}");

        let telemetry = TelemetryAggregate::from_json(r#"{"./app/templates/a.hbs": ["foo"]}"#).unwrap();
        let report = rewrite_selected(&[a, b], &telemetry, &project.config);
        assert_eq!(report.written(), 1);
        assert_eq!(report.unchanged(), 1);
        assert_eq!(project.read("app/templates/a.hbs"), "<Foo />");
        assert_eq!(project.read("app/templates/b.hbs"), "{{foo}}");
    }

    #[test]
    fn test_missing_telemetry_template_is_reported() {
        let project = Project::new();
        let telemetry = TelemetryAggregate::from_json(r#"{"app/templates/gone.hbs": ["foo"]}"#).unwrap();
        let report = rewrite_files(&telemetry, &project.config);
        assert_eq!(status_code(&report.files[0].status), Some(ERR_IO));
    }

    #[test]
    fn test_unwritable_helper_fails_templates_without_touching_them() {
        let project = Project::new();
        // a file where the helpers directory should be
        project.write("app/helpers", "");
        let path = project.write("app/templates/a.hbs", "{{foo}}");

        let report = instrument_files(&[path], &project.config);
        assert!(report.stub.is_none());
        assert_eq!(status_code(&report.files[0].status), Some(ERR_IO));
        assert_eq!(project.read("app/templates/a.hbs"), "{{foo}}");
        assert!(project.path("app/helpers").is_file());
    }
}

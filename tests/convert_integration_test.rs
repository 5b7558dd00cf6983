mod common;

use anyhow::Result;
use common::{dump, events, kinds, payloads, progress, Workspace};
use serial_test::serial;
use std::fs;

#[test]
#[serial]
fn empty_source_folder_reports_error_then_done() -> Result<()> {
    let workspace = Workspace::new()?
        .with_installed_dependencies()?
        .with_source_file("readme.md", "# notes")?;

    let output = workspace.convert_command().output()?;
    dump(&output);
    let events = events(&output);

    assert!(!output.status.success());
    assert_eq!(
        payloads(&events, "error"),
        vec!["No EXE or Python files found in source folder".to_string()]
    );
    assert_eq!(kinds(&events).last().map(String::as_str), Some("done"));
    assert_eq!(kinds(&events).iter().filter(|k| *k == "done").count(), 1);
    assert_eq!(progress(&events), vec![0]);
    assert!(!workspace.output().exists(), "output must not be created before a target is found");
    Ok(())
}

#[test]
#[serial]
fn missing_source_folder_is_rejected_before_scanning() -> Result<()> {
    let workspace = Workspace::new()?.with_installed_dependencies()?;
    fs::remove_dir_all(workspace.source())?;

    let output = workspace.convert_command().output()?;
    dump(&output);
    let events = events(&output);

    assert!(!output.status.success());
    let errors = payloads(&events, "error");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Source folder does not exist"), "{errors:?}");
    assert!(progress(&events).is_empty());
    assert_eq!(kinds(&events).last().map(String::as_str), Some("done"));
    Ok(())
}

#[test]
#[serial]
fn uncreatable_output_folder_reports_error_then_done() -> Result<()> {
    let workspace = Workspace::new()?
        .with_installed_dependencies()?
        .with_source_file("app.py", "print('hi')")?;
    // A regular file where the output folder should go.
    fs::write(workspace.output(), "not a directory")?;

    let output = workspace.convert_command().output()?;
    dump(&output);
    let events = events(&output);

    assert!(!output.status.success());
    let errors = payloads(&events, "error");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Could not create output directory"), "{errors:?}");
    assert_eq!(progress(&events), vec![0, 20]);
    assert_eq!(kinds(&events).last().map(String::as_str), Some("done"));
    Ok(())
}

#[test]
#[serial]
fn diagnostic_log_is_appended_in_working_directory() -> Result<()> {
    let workspace = Workspace::new()?.with_installed_dependencies()?;

    workspace.convert_command().output()?;
    workspace.convert_command().output()?;

    let log = fs::read_to_string(workspace.log_file())?;
    assert_eq!(log.matches("Starting app conversion").count(), 2);
    assert!(log.contains(" - INFO - "));
    assert!(log.contains(" - ERROR - "));
    Ok(())
}

#[cfg(unix)]
mod with_fake_python {
    use super::*;

    #[test]
    #[serial]
    fn script_folder_becomes_single_artifact() -> Result<()> {
        let workspace = Workspace::new()?
            .with_installed_dependencies()?
            .with_source_file("app.py", "print('hello')")?
            .with_source_file("config.json", "{}")?;
        let python = workspace.fake_python(0)?;

        let output = workspace
            .convert_command()
            .arg("--python")
            .arg(&python)
            .output()?;
        dump(&output);
        let events = events(&output);

        assert!(output.status.success());
        assert_eq!(progress(&events), vec![0, 20, 40, 60, 80, 100]);

        let logs = payloads(&events, "log");
        assert!(logs.iter().any(|l| l.starts_with("Found Python file:")));
        assert!(logs.iter().any(|l| l == "Running PyInstaller..."));
        assert!(logs.iter().any(|l| l.contains("Building EXE")));
        assert!(!logs.iter().any(|l| l.starts_with("Window mode enabled")));

        let successes = payloads(&events, "success");
        assert_eq!(successes.len(), 1);
        assert!(successes[0].contains(&workspace.output().display().to_string()));
        assert!(payloads(&events, "error").is_empty());
        assert_eq!(kinds(&events).last().map(String::as_str), Some("done"));

        let remaining: Vec<String> = fs::read_dir(workspace.output())?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(remaining, vec!["app".to_string()]);

        let args = workspace.recorded_args()?;
        assert_eq!(args[0], "-m");
        assert_eq!(args[1], "PyInstaller");
        assert!(args.iter().any(|a| a == "--onefile"));
        assert!(!args.iter().any(|a| a == "--windowed"));
        let data = format!("{}/*:.", workspace.source().display());
        assert!(args.contains(&data), "{args:?}");
        Ok(())
    }

    #[test]
    #[serial]
    fn windowed_flag_and_name_reach_pyinstaller() -> Result<()> {
        let workspace = Workspace::new()?
            .with_installed_dependencies()?
            .with_source_file("tool.exe", "MZ")?
            .with_source_file("helper.py", "")?;
        let python = workspace.fake_python(0)?;

        let output = workspace
            .convert_command()
            .args(["--windowed", "--name", "Packed"])
            .arg("--python")
            .arg(&python)
            .output()?;
        dump(&output);
        let events = events(&output);

        assert!(output.status.success());
        let logs = payloads(&events, "log");
        assert!(logs.iter().any(|l| l.starts_with("Found EXE file:")));
        assert!(logs
            .iter()
            .any(|l| l == "Window mode enabled - console will be hidden in final EXE"));

        let args = workspace.recorded_args()?;
        assert!(args.iter().any(|a| a == "--windowed"));
        let name_at = args.iter().position(|a| a == "--name").expect("--name passed");
        assert_eq!(args[name_at + 1], "Packed");
        assert!(workspace.output().join("Packed").is_file());
        Ok(())
    }

    #[test]
    #[serial]
    fn pyinstaller_failure_cleans_up_and_reports() -> Result<()> {
        let workspace = Workspace::new()?
            .with_installed_dependencies()?
            .with_source_file("app.py", "")?;
        let python = workspace.fake_python(2)?;

        let output = workspace
            .convert_command()
            .arg("--python")
            .arg(&python)
            .output()?;
        dump(&output);
        let events = events(&output);

        assert!(!output.status.success());
        let errors = payloads(&events, "error");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("An error occurred: PyInstaller failed"), "{errors:?}");
        assert!(errors[0].contains("fake PyInstaller failure"));
        assert!(payloads(&events, "log").iter().any(|l| l.starts_with("ERROR: ")));
        assert!(!progress(&events).contains(&100));
        assert!(payloads(&events, "success").is_empty());
        assert_eq!(kinds(&events).last().map(String::as_str), Some("done"));

        assert!(!workspace.output().join("build").exists());
        assert!(!workspace.output().join("app.spec").exists());
        Ok(())
    }
}

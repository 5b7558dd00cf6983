use crate::bundler::{Bundle, BundleJob};
use crate::config::{AppContext, DependencyRecord};
use crate::error::{ConvertError, ConvertResult};
use crate::platform::Platform;
use crate::relay::RelaySender;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Context rooted at `base` whose only dependency is already installed.
pub fn test_context(base: &Path) -> AppContext {
    let deps_dir = base.join("dependencies");
    let dep = DependencyRecord::new("pyinstaller", "6.12.0", "http://127.0.0.1:9/p.whl", &deps_dir);
    fs::create_dir_all(&dep.install_path).unwrap();
    AppContext {
        platform: Platform::current(),
        base_dir: base.to_path_buf(),
        python: PathBuf::from("python3"),
        dependencies: vec![dep],
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Behaviour {
    #[default]
    Succeed,
    Fail,
    Panic,
}

/// Stands in for PyInstaller: leaves the files a one-file build leaves behind.
#[derive(Default)]
pub struct FakeBundler {
    pub calls: AtomicUsize,
    behaviour: Behaviour,
    last_job: Mutex<Option<BundleJob>>,
}

impl FakeBundler {
    pub fn failing() -> Self {
        Self {
            behaviour: Behaviour::Fail,
            ..Default::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            behaviour: Behaviour::Panic,
            ..Default::default()
        }
    }

    pub fn last_job(&self) -> Option<BundleJob> {
        self.last_job.lock().unwrap().clone()
    }
}

impl Bundle for FakeBundler {
    fn invoke(
        &self,
        job: &BundleJob,
        relay: &RelaySender,
    ) -> impl Future<Output = ConvertResult<()>> + Send {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_job.lock().unwrap() = Some(job.clone());
            assert!(job.stub_path.is_file(), "stub must exist while bundling");

            fs::create_dir_all(job.work_dir().join("launcher")).unwrap();
            fs::write(job.spec_file(), "# spec").unwrap();
            relay.log("fake bundler running");

            match self.behaviour {
                Behaviour::Succeed => {
                    let artifact = Platform::current().artifact_path(&job.output_dir, &job.name);
                    fs::write(artifact, "binary").unwrap();
                    Ok(())
                }
                Behaviour::Fail => Err(ConvertError::Bundler("exit status: 1".into())),
                Behaviour::Panic => panic!("bundler crashed"),
            }
        }
    }
}

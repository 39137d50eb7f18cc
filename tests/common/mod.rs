use lsf_exporter::collectors::CollectorRegistry;
use lsf_exporter::collectors::config::CollectorConfig;
use lsf_exporter::exporter::ExporterSettings;
use once_cell::sync::Lazy;
use std::fs;
use std::io::Write;
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

const BHOSTS: &str = "\
HOST_NAME          STATUS          JL/U    MAX  NJOBS    RUN  SSUSP  USUSP    RSV
node001            ok              -        32      2      2      0      0      0
node002            closed_Full     -        16     16     16      0      0      0
";

const BQUEUES: &str = "\
QUEUE_NAME      PRIO STATUS          MAX JL/U JL/P JL/H NJOBS  PEND   RUN  SUSP  RSV
normal           30  Open:Active       -    -    -    -    18     0    18     0    0
";

const BJOBS: &str = r#"{
  "COMMAND":"bjobs",
  "JOBS":1,
  "RECORDS":[
    {
      "JOBID":"4242",
      "USER":"alice",
      "STAT":"RUN",
      "QUEUE":"normal",
      "APPLICATION":"fluent",
      "MIN_REQ_PROC":"16",
      "PEND_TIME":"30",
      "EPENDTIME":"25",
      "IPENDTIME":"5"
    }
  ]
}
"#;

const LSID: &str = "\
IBM Spectrum LSF Standard 10.1.0.13, Jan 12 2023
Copyright International Business Machines Corp. 1992, 2016.

My cluster name is test_cluster
My master name is mgmt01
";

const LSLOAD: &str = "\
HOST_NAME       status  r15s   r1m  r15m   ut    pg  ls    it   tmp   swp   mem
node001             ok   0.5   1.0   0.8  35%   0.0   2    15  7.7G    2G  512M
node003        unavail
";

const LSHOSTS: &str = "\
HOST_NAME      type    model  cpuf ncpus nprocs ncores nthreads maxmem maxswp server RESOURCES
node001      X86_64 Intel_EM64T  60.0    32      2     16        1 251.6G    8G    Yes (linux gpu)
";

/// Directory of shell scripts standing in for the LSF commands.
///
/// Created once per test binary so no script is still open for writing
/// while another test spawns a child.
static FAKE_LSF: Lazy<TempDir> = Lazy::new(|| {
    let dir = tempfile::tempdir().expect("Failed to create fake LSF dir");
    for (name, output) in [
        ("bhosts", BHOSTS),
        ("bqueues", BQUEUES),
        ("bjobs", BJOBS),
        ("lsid", LSID),
        ("lsload", LSLOAD),
        ("lshosts", LSHOSTS),
    ] {
        write_script(dir.path(), name, &format!("cat <<'EOF'\n{output}EOF\n"));
    }
    fs::write(dir.path().join("solvers.csv"), "fluent,ANSYS Fluent\n")
        .expect("Failed to write solver map");
    dir
});

fn write_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    let mut file = fs::File::create(&path).expect("Failed to create fake LSF command");
    file.write_all(format!("#!/bin/sh\n{body}").as_bytes())
        .expect("Failed to write fake LSF command");
    file.sync_all().expect("Failed to sync fake LSF command");
    drop(file);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("Failed to make fake LSF command executable");
}

/// Bin dir holding the fake LSF commands
#[allow(dead_code)]
pub fn fake_lsf_bin() -> PathBuf {
    FAKE_LSF.path().to_path_buf()
}

/// Exporter settings wired to the fake LSF commands
#[allow(dead_code)]
pub fn fake_settings() -> ExporterSettings {
    let registry = CollectorRegistry::with_builtin().expect("Failed to build collector registry");
    let config = CollectorConfig::new()
        .with_bin_dir(Some(fake_lsf_bin()))
        .with_solver_map(Some(fake_lsf_bin().join("solvers.csv")))
        .with_command_timeout(Some(Duration::from_secs(10)));
    ExporterSettings::new(registry, config)
}

/// Get an available port for testing
#[allow(dead_code)]
pub fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to ephemeral port")
        .local_addr()
        .expect("Failed to get local address")
        .port()
}

/// Build test URL for HTTP requests
#[allow(dead_code)]
pub fn get_test_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

/// Wait for server to be ready
#[allow(dead_code)]
pub async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    for _ in 0..max_attempts {
        if tokio::net::TcpStream::connect(format!("127.0.0.1:{port}"))
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(100)).await;
    }
    false
}

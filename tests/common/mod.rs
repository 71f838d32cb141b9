use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::LazyLock;

use serde_json::Value;
use tempfile::TempDir;

pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub admin_secret: String,
    server_process: Option<Child>,
}

static BUILD_RELEASE: LazyLock<()> = LazyLock::new(|| {
    let build_status = Command::new("cargo")
        .args(["build", "--release"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("build release binary");
    assert!(build_status.success(), "Failed to build release binary");
});

impl TestServer {
    pub async fn start() -> Self {
        LazyLock::force(&BUILD_RELEASE);

        let temp_dir = TempDir::new().expect("create temp dir");
        let data_dir = temp_dir.path();
        let binary = Path::new(env!("CARGO_MANIFEST_DIR")).join("target/release/beacon");

        let init_output = Command::new(&binary)
            .args(["admin", "init", "--data-dir"])
            .arg(data_dir)
            .output()
            .expect("run init");
        assert!(init_output.status.success(), "Failed to initialize");

        let secret_path = data_dir.join(".admin_secret");
        let admin_secret = std::fs::read_to_string(&secret_path)
            .expect("read admin secret")
            .trim()
            .to_string();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let base_url = format!("http://127.0.0.1:{}", port);

        let server_process = Command::new(&binary)
            .args(["serve", "--data-dir"])
            .arg(data_dir)
            .args(["--host", "127.0.0.1", "--port"])
            .arg(port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("start server");

        Self::wait_for_ready(&base_url).await;

        Self {
            temp_dir,
            base_url,
            admin_secret,
            server_process: Some(server_process),
        }
    }

    async fn wait_for_ready(base_url: &str) {
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/health", base_url))
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!("Server did not become ready");
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Direct database handle, for inducing drift and time-travelling
    /// lifecycle stamps that the API deliberately refuses to set.
    pub fn open_db(&self) -> rusqlite::Connection {
        rusqlite::Connection::open(self.data_dir().join("beacon.db")).expect("open db")
    }

    /// Logs in through the identity callback and returns (token, user_id).
    pub async fn login(&self, provider: &str, provider_user_id: &str, email: &str) -> (String, String) {
        let client = reqwest::Client::new();
        let resp: Value = client
            .post(format!("{}/api/v1/auth/callback/{provider}", self.base_url))
            .json(&serde_json::json!({
                "id": provider_user_id,
                "email": email,
                "name": "Test User",
            }))
            .send()
            .await
            .expect("identity callback")
            .json()
            .await
            .expect("parse session response");

        let token = resp["data"]["token"].as_str().expect("token").to_string();
        let user_id = resp["data"]["user"]["id"]
            .as_str()
            .expect("user id")
            .to_string();
        (token, user_id)
    }

    /// The workspace provisioned for the given session's user.
    pub async fn own_workspace_id(&self, token: &str) -> String {
        let client = reqwest::Client::new();
        let resp: Value = client
            .get(format!("{}/api/v1/workspaces", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .expect("list workspaces")
            .json()
            .await
            .expect("parse workspaces");
        resp["data"][0]["id"]
            .as_str()
            .expect("workspace id")
            .to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(mut process) = self.server_process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}

use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Server configuration, read from flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "quiz-log-api", version, about = "Quiz results log and admin dashboard API")]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "QUIZ_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "QUIZ_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Directory holding questions.json and results.ndjson
    #[arg(long, env = "QUIZ_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory holding index.html, admin.html and other front-end assets
    #[arg(long, env = "QUIZ_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Allow cross-origin requests from any origin
    #[arg(long, env = "QUIZ_CORS")]
    pub cors: bool,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn paths(&self) -> DataPaths {
        DataPaths::new(&self.data_dir, &self.static_dir)
    }
}

/// Every file the server touches.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub catalog: PathBuf,
    pub results_log: PathBuf,
    pub static_dir: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: &std::path::Path, static_dir: &std::path::Path) -> Self {
        Self {
            catalog: data_dir.join("questions.json"),
            results_log: data_dir.join("results.ndjson"),
            static_dir: static_dir.to_path_buf(),
        }
    }

    pub fn index_page(&self) -> PathBuf {
        self.static_dir.join("index.html")
    }

    pub fn admin_page(&self) -> PathBuf {
        self.static_dir.join("admin.html")
    }
}

//! # medirag-ref-healthcare
//!
//! Reference federation of three fictional hospitals.
//!
//! - **Hospital A**: admissions, medicine, psychiatry. Shares with hospital B.
//!   Psychiatry notes carry a per-document policy for technicians.
//! - **Hospital B**: admissions and cardiology. Shares with hospital A.
//! - **Hospital C**: admissions and neurology. Admits hospital A physicians
//!   only with a `C_neuro` affiliation.
//!
//! Each hospital is an organization tree file under `hospitals/`, with its
//! policies under `policies/` and its corpora under `data/`. All patients are
//! fictional.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::{net::TcpListener, task::JoinHandle};
use tracing::info;

use medirag_contracts::error::{MediragError, MediragResult};
use medirag_core::RetrieverNode;
use medirag_federation::{server, BuildOptions, OrgConfig, RETRIEVE_PATH};

pub mod prompt;
pub mod scenarios;

/// Every patient appearing in the reference corpora. Feeds the gazetteer
/// name extractor of a reference federation root.
pub const KNOWN_PATIENTS: &[&str] = &[
    "Edward Fisher",
    "Janet Aguilar",
    "Ann Lee",
    "Marcus Webb",
    "Priya Shah",
    "Tomas Lindqvist",
    "Grace Okafor",
    "Hannah Kowalski",
    "Omar Haddad",
    "Lucia Romero",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hospital {
    A,
    B,
    C,
}

impl Hospital {
    pub const ALL: [Hospital; 3] = [Hospital::A, Hospital::B, Hospital::C];

    pub fn org(&self) -> &'static str {
        match self {
            Hospital::A => "A",
            Hospital::B => "B",
            Hospital::C => "C",
        }
    }

    /// Path of this hospital's organization tree file.
    pub fn config_path(&self) -> PathBuf {
        let file = match self {
            Hospital::A => "hospital_a.toml",
            Hospital::B => "hospital_b.toml",
            Hospital::C => "hospital_c.toml",
        };
        Path::new(env!("CARGO_MANIFEST_DIR")).join("hospitals").join(file)
    }
}

pub fn hospital_config(hospital: Hospital) -> MediragResult<OrgConfig> {
    OrgConfig::from_file(&hospital.config_path())
}

pub fn build_hospital(hospital: Hospital, options: &BuildOptions) -> MediragResult<RetrieverNode> {
    hospital_config(hospital)?.build_tree(options)
}

/// A hospital endpoint running on a background task.
pub struct RunningHospital {
    pub hospital: Hospital,
    pub addr: SocketAddr,
    pub task: JoinHandle<MediragResult<()>>,
}

impl RunningHospital {
    /// Full retrieve URL, as listed in a federation's `peers`.
    pub fn endpoint(&self) -> String {
        format!("http://{}{}", self.addr, RETRIEVE_PATH)
    }
}

impl Drop for RunningHospital {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Build `hospital` and serve it on an ephemeral localhost port.
pub async fn spawn_hospital(hospital: Hospital, options: &BuildOptions) -> MediragResult<RunningHospital> {
    let tree = build_hospital(hospital, options)?;
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| MediragError::Config {
            reason: format!("failed to bind endpoint for hospital {}: {}", hospital.org(), e),
        })?;
    let addr = listener.local_addr().map_err(|e| MediragError::Config {
        reason: format!("listener has no local address: {}", e),
    })?;
    let task = tokio::spawn(server::serve(listener, Arc::new(tree)));
    info!(org = hospital.org(), %addr, "reference hospital started");
    Ok(RunningHospital { hospital, addr, task })
}

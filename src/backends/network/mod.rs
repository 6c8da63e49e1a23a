use crate::io::NetworkConfig;
use crate::utils::Timer;
use anyhow::{bail, Context};
use log::info;
use lscivr_dynamics::constants::BOHR_TO_ANGS;
use lscivr_dynamics::interface::{ElectronicStructure, QCInterface, QCRequest, RequestKind};
use lscivr_dynamics::OracleFailure;
use ndarray::prelude::*;
use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

pub use client::{wait_until_available, Connection};
pub use messages::*;

mod client;
mod messages;

/// Persistent electronic structure server that runs one job per request.
pub struct NetworkInterface {
    address: String,
    config: NetworkConfig,
    atoms: Vec<String>,
    n_states: usize,
    max_state: usize,
    options: BTreeMap<String, Value>,
    // excited state restart data on the server, one per trajectory
    restart_name: String,
    connection: Option<Connection>,
}

/// Name of the excited state restart data of the trajectory in `directory`.
fn restart_name(directory: &Path) -> String {
    let directory: PathBuf = directory
        .canonicalize()
        .unwrap_or_else(|_| directory.to_path_buf());
    let mut hasher = DefaultHasher::new();
    directory.hash(&mut hasher);
    format!("cis_restart_{}_{:016x}", std::process::id(), hasher.finish())
}

impl NetworkInterface {
    /// The connection is established with the first job.
    pub fn new(
        directory: &Path,
        config: NetworkConfig,
        atoms: Vec<String>,
        n_states: usize,
    ) -> anyhow::Result<Self> {
        if let Err(message) = config.validate() {
            bail!(message);
        }
        let max_state: usize = config.max_state.unwrap_or(n_states.saturating_sub(1));
        let mut options: BTreeMap<String, Value> = BTreeMap::new();
        for (key, value) in config.options.iter() {
            let value: Value = serde_json::to_value(value)
                .with_context(|| format!("option '{}' cannot be sent to the server", key))?;
            options.insert(key.clone(), value);
        }
        if let Some(roots) = options.get("cisnumstates") {
            match roots.as_u64() {
                Some(roots) if roots as usize >= max_state => {}
                Some(roots) => bail!(
                    "cisnumstates = {} is less than the requested electronic state {}",
                    roots,
                    max_state
                ),
                None => bail!("cisnumstates has to be a positive integer, found {}", roots),
            }
        }
        Ok(Self {
            address: format!("{}:{}", config.host, config.port),
            config,
            atoms,
            n_states,
            max_state,
            options,
            restart_name: restart_name(directory),
            connection: None,
        })
    }

    /// Options of a single job. A guess is only given for jobs that follow another job at the
    /// same geometry.
    pub fn job_options(&self, request: &QCRequest) -> BTreeMap<String, Value> {
        let mut options: BTreeMap<String, Value> = self.options.clone();
        let default_roots: usize = self.max_state + 2;
        if self.max_state > 0 {
            options.insert(
                String::from("cisrestart"),
                json!(self.restart_name),
            );
            options
                .entry(String::from("cisnumstates"))
                .or_insert_with(|| json!(default_roots));
        }
        options.insert(String::from("purify"), json!(false));

        match request.kind {
            RequestKind::Energy => {}
            RequestKind::Gradient {
                state,
                excited_states,
            } => {
                if state > 0 {
                    options.insert(String::from("cis"), json!("yes"));
                    let roots: usize = excited_states.unwrap_or(default_roots);
                    if !self.options.contains_key("cisnumstates") {
                        options.insert(String::from("cisnumstates"), json!(roots));
                    }
                    options.insert(String::from("cistarget"), json!(state));
                }
            }
            RequestKind::Coupling { bra, ket } => {
                options.insert(String::from("nacstate1"), json!(bra));
                options.insert(String::from("nacstate2"), json!(ket));
                options.insert(String::from("cis"), json!("yes"));
                options.insert(String::from("cisnumstates"), json!(default_roots));
            }
        }
        if let Some(guess) = &request.guess {
            options.insert(String::from("guess"), json!(guess));
        }
        options
    }

    fn connection(&mut self) -> Result<&mut Connection, OracleFailure> {
        if self.connection.is_none() {
            let connection: Connection = wait_until_available(
                &self.address,
                self.config.max_wait,
                self.config.poll_interval,
                self.config.io_timeout,
            )?;
            self.connection = Some(connection);
        }
        self.connection
            .as_mut()
            .ok_or_else(|| OracleFailure::Unavailable(String::from("no connection to the server")))
    }

    /// Takes over all quantities of the reply that belong to the request.
    fn to_structure(
        &self,
        request: &QCRequest,
        result: JobResult,
        n_nuclear: usize,
    ) -> ElectronicStructure {
        let mut data = ElectronicStructure::new(self.n_states, n_nuclear);
        let flatten = |rows: Option<Vec<Vec<f64>>>| -> Option<Array1<f64>> {
            let values: Vec<f64> = rows?.into_iter().flatten().collect();
            (values.len() == n_nuclear).then(|| Array1::from(values))
        };

        match request.kind {
            RequestKind::Energy => match &result.energy {
                Energy::Single(energy) => data.set_energy(0, *energy),
                Energy::States(energies) => {
                    for (state, energy) in energies.iter().take(self.n_states).enumerate() {
                        data.set_energy(state, *energy);
                    }
                }
            },
            RequestKind::Gradient { state, .. } => {
                if state < self.n_states {
                    let energy: Option<f64> = match &result.energy {
                        Energy::Single(energy) => Some(*energy),
                        Energy::States(energies) => energies.get(state).copied(),
                    };
                    if let Some(energy) = energy {
                        data.set_energy(state, energy);
                    }
                    if let Some(gradient) = flatten(result.gradient) {
                        data.set_gradient(state, gradient.view());
                    }
                }
            }
            RequestKind::Coupling { bra, ket } => {
                if bra < self.n_states && ket < self.n_states {
                    if let Some(coupling) = flatten(result.nacme) {
                        data.set_coupling(bra, ket, coupling.view());
                    }
                }
            }
        }
        data.orbitals = result.orbfile;
        data
    }
}

impl QCInterface for NetworkInterface {
    fn evaluate(
        &mut self,
        coordinates: ArrayView1<f64>,
        request: &QCRequest,
    ) -> Result<ElectronicStructure, OracleFailure> {
        let timer: Timer = Timer::start();
        let (job, label): (JobKind, String) = match request.kind {
            RequestKind::Energy => (JobKind::Energy, String::from("energy")),
            RequestKind::Gradient { state, .. } => (JobKind::Gradient, format!("gradient {}", state)),
            RequestKind::Coupling { bra, ket } => {
                (JobKind::Coupling, format!("coupling {} {}", bra, ket))
            }
        };
        let message = ClientMessage::Job(JobRequest {
            job,
            geometry: coordinates.iter().map(|x| x * BOHR_TO_ANGS).collect(),
            units: String::from("angstrom"),
            atoms: self.atoms.clone(),
            options: self.job_options(request),
        });

        let sent = self.connection()?.send(&message);
        let reply: ServerMessage = match sent {
            Ok(reply) => reply,
            Err(error) => {
                // the next job starts with a new handshake
                self.connection = None;
                return Err(OracleFailure::Unavailable(format!(
                    "{} job at {} failed: {}",
                    label, self.address, error
                )));
            }
        };
        let result: JobResult = match reply {
            ServerMessage::Result(result) => result,
            ServerMessage::Error { message } => {
                return Err(OracleFailure::Unavailable(format!(
                    "{} job failed: {}",
                    label, message
                )))
            }
            ServerMessage::Status { .. } => {
                return Err(OracleFailure::Unavailable(format!(
                    "status reply to the {} job",
                    label
                )))
            }
        };
        info!("{:<25} {:>18.2} s", format!("{}:", label), timer.elapsed());
        Ok(self.to_structure(request, result, coordinates.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use lscivr_dynamics::interface::ElectronicTargets;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::mpsc::{channel, Sender};
    use std::thread;

    /// Serves one connection: status requests are answered as available, jobs are
    /// forwarded to the test and answered by `reply`.
    fn serve(
        listener: TcpListener,
        jobs: Sender<JobRequest>,
        reply: fn(&JobRequest, usize) -> ServerMessage,
    ) {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;
        let mut count: usize = 0;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap_or(0) == 0 {
                break;
            }
            let answer = match serde_json::from_str::<ClientMessage>(line.trim()).unwrap() {
                ClientMessage::Status => ServerMessage::Status { available: true },
                ClientMessage::Job(job) => {
                    count += 1;
                    let answer = reply(&job, count);
                    jobs.send(job).unwrap();
                    answer
                }
            };
            let text = format!("{}\n", serde_json::to_string(&answer).unwrap());
            if writer.write_all(text.as_bytes()).is_err() {
                break;
            }
        }
    }

    fn two_state_server(job: &JobRequest, count: usize) -> ServerMessage {
        let orbfile = Some(format!("scr/c0_{}", count));
        match job.job {
            JobKind::Gradient => {
                let sign: f64 = if job.options.contains_key("cistarget") { 2.0 } else { 1.0 };
                ServerMessage::Result(JobResult {
                    energy: Energy::States(vec![-1.0, -0.5]),
                    gradient: Some(vec![vec![0.1 * sign, 0.0, 0.0], vec![-0.1 * sign, 0.0, 0.0]]),
                    nacme: None,
                    orbfile,
                })
            }
            JobKind::Coupling => ServerMessage::Result(JobResult {
                energy: Energy::Single(-1.0),
                gradient: None,
                nacme: Some(vec![vec![0.0, 0.0, 0.3], vec![0.0, 0.0, -0.3]]),
                orbfile,
            }),
            JobKind::Energy => ServerMessage::Error {
                message: String::from("energy jobs are not served"),
            },
        }
    }

    fn interface(port: u16, options: BTreeMap<String, toml::Value>) -> NetworkInterface {
        let config = NetworkConfig {
            host: String::from("127.0.0.1"),
            port,
            max_wait: 1.0,
            poll_interval: 0.1,
            io_timeout: 5.0,
            max_state: None,
            options,
        };
        NetworkInterface::new(
            &std::env::temp_dir(),
            config,
            vec![String::from("H"), String::from("H")],
            2,
        )
        .unwrap()
    }

    #[test]
    fn jobs_are_chained_with_the_orbitals() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port: u16 = listener.local_addr().unwrap().port();
        let (sender, receiver) = channel();
        thread::spawn(move || serve(listener, sender, two_state_server));

        let mut options = BTreeMap::new();
        options.insert(String::from("method"), toml::Value::String(String::from("hf")));
        let mut oracle = interface(port, options);
        let coordinates = array![0.0, 0.0, -0.7, 0.0, 0.0, 0.7];
        let data = oracle
            .compute_data(coordinates.view(), &ElectronicTargets::all(2))
            .unwrap();

        assert_abs_diff_eq!(data.energies, array![-1.0, -0.5], epsilon = 1e-14);
        assert_abs_diff_eq!(data.gradients[[0, 0]], 0.1, epsilon = 1e-14);
        assert_abs_diff_eq!(data.gradients[[1, 3]], -0.2, epsilon = 1e-14);
        assert_abs_diff_eq!(data.couplings[[1, 0, 2]], -0.3, epsilon = 1e-14);
        assert_eq!(data.orbitals.as_deref(), Some("scr/c0_3"));

        let jobs: Vec<JobRequest> = receiver.try_iter().collect();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].units, "angstrom");
        assert_abs_diff_eq!(jobs[0].geometry[5], 0.7 * BOHR_TO_ANGS, epsilon = 1e-14);

        let first = &jobs[0].options;
        assert_eq!(first["method"], json!("hf"));
        assert_eq!(first["purify"], json!(false));
        assert_eq!(first["cisnumstates"], json!(3));
        assert!(first.contains_key("cisrestart"));
        assert!(!first.contains_key("guess"));
        assert!(!first.contains_key("cis"));

        let second = &jobs[1].options;
        assert_eq!(second["cis"], json!("yes"));
        assert_eq!(second["cistarget"], json!(1));
        assert_eq!(second["guess"], json!("scr/c0_1"));

        assert_eq!(jobs[2].job, JobKind::Coupling);
        assert_eq!(jobs[2].options["nacstate1"], json!(0));
        assert_eq!(jobs[2].options["nacstate2"], json!(1));
        assert_eq!(jobs[2].options["guess"], json!("scr/c0_2"));
    }

    #[test]
    fn server_errors_are_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port: u16 = listener.local_addr().unwrap().port();
        let (sender, _receiver) = channel();
        thread::spawn(move || serve(listener, sender, two_state_server));

        let mut oracle = interface(port, BTreeMap::new());
        let coordinates = array![0.0, 0.0, -0.7, 0.0, 0.0, 0.7];
        let failure = oracle
            .evaluate(coordinates.view(), &QCRequest::new(RequestKind::Energy))
            .unwrap_err();
        assert!(matches!(failure, OracleFailure::Unavailable(_)));

        // a coupling reply without the coupling vector leaves it missing
        let targets = ElectronicTargets::new(2, vec![], vec![(0, 1)], None).unwrap();
        let request = QCRequest::new(RequestKind::Gradient {
            state: 0,
            excited_states: None,
        });
        let data = oracle.evaluate(coordinates.view(), &request).unwrap();
        assert_eq!(data.verify(&targets), Err(OracleFailure::CouplingMissing(0, 1)));
    }

    #[test]
    fn unreachable_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port: u16 = listener.local_addr().unwrap().port();
        drop(listener);
        let mut oracle = interface(port, BTreeMap::new());
        let coordinates = array![0.0, 0.0, -0.7, 0.0, 0.0, 0.7];
        let failure = oracle
            .evaluate(coordinates.view(), &QCRequest::new(RequestKind::Energy))
            .unwrap_err();
        assert_eq!(failure, OracleFailure::Timeout(1.0));
    }

    #[test]
    fn too_few_excited_states_are_rejected() {
        let mut options = BTreeMap::new();
        options.insert(String::from("cisnumstates"), toml::Value::Integer(1));
        let config = NetworkConfig {
            max_state: Some(2),
            options,
            ..NetworkConfig::default()
        };
        assert!(NetworkInterface::new(Path::new("."), config, vec![String::from("H")], 3).is_err());
    }

    #[test]
    fn trajectories_have_their_own_restart_data() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let build = |directory: &Path| {
            NetworkInterface::new(
                directory,
                NetworkConfig::default(),
                vec![String::from("H"), String::from("H")],
                2,
            )
            .unwrap()
        };
        let request = QCRequest::new(RequestKind::Energy);
        let a = build(first.path()).job_options(&request);
        let b = build(second.path()).job_options(&request);
        let again = build(first.path()).job_options(&request);
        assert_ne!(a["cisrestart"], b["cisrestart"]);
        assert_eq!(a["cisrestart"], again["cisrestart"]);
    }

    #[test]
    fn invalid_waits_are_rejected_before_connecting() {
        let config = NetworkConfig {
            poll_interval: 0.0,
            ..NetworkConfig::default()
        };
        assert!(NetworkInterface::new(Path::new("."), config, vec![String::from("H")], 1).is_err());
    }
}

use crate::backends::network::messages::{ClientMessage, ServerMessage};
use log::{info, warn};
use lscivr_dynamics::OracleFailure;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

// lower bound of the time a single handshake step may take
const MIN_ATTEMPT_TIME: f64 = 0.01;

/// Line based JSON connection to the electronic structure server.
pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

fn optional_duration(seconds: f64) -> Option<Duration> {
    if seconds > 0.0 && seconds.is_finite() {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

impl Connection {
    /// Connects within `timeout` and limits every read and write of the status
    /// exchange to the same time.
    fn open(address: &str, timeout: Duration) -> io::Result<Self> {
        let addresses: Vec<SocketAddr> = address.to_socket_addrs()?.collect();
        let mut last_error: io::Error = io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{} could not be resolved", address),
        );
        for socket_address in addresses.iter() {
            match TcpStream::connect_timeout(socket_address, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    let writer: TcpStream = stream.try_clone()?;
                    return Ok(Self {
                        reader: BufReader::new(stream),
                        writer,
                    });
                }
                Err(error) => last_error = error,
            }
        }
        Err(last_error)
    }

    /// Job replies may take `io_timeout` seconds, 0 waits without limit.
    fn set_job_timeout(&self, io_timeout: f64) -> io::Result<()> {
        self.writer.set_read_timeout(optional_duration(io_timeout))?;
        self.writer.set_write_timeout(None)
    }

    /// Sends one message and blocks until the reply arrived.
    pub fn send(&mut self, message: &ClientMessage) -> io::Result<ServerMessage> {
        let mut line: String = serde_json::to_string(message)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;

        let mut reply: String = String::new();
        if self.reader.read_line(&mut reply)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by the server",
            ));
        }
        Ok(serde_json::from_str(reply.trim())?)
    }

    pub fn is_available(&mut self) -> io::Result<bool> {
        match self.send(&ClientMessage::Status)? {
            ServerMessage::Status { available } => Ok(available),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected reply to a status request: {:?}", other),
            )),
        }
    }
}

/// Connects to the server and checks its status until it is available. Every failed
/// attempt waits `poll_interval` seconds, after `max_wait` seconds in total the server
/// is given up. Connecting and the status exchange never take longer than the
/// remaining wait, `io_timeout` only applies to the replies of the jobs.
pub fn wait_until_available(
    address: &str,
    max_wait: f64,
    poll_interval: f64,
    io_timeout: f64,
) -> Result<Connection, OracleFailure> {
    if !(poll_interval > 0.0 && poll_interval.is_finite()) || !(max_wait >= 0.0 && max_wait.is_finite()) {
        return Err(OracleFailure::Unavailable(format!(
            "invalid wait for the server at {}: max_wait = {} s, poll_interval = {} s",
            address, max_wait, poll_interval
        )));
    }
    let start: Instant = Instant::now();
    loop {
        let remaining: f64 = max_wait - start.elapsed().as_secs_f64();
        let attempt_time: Duration = Duration::from_secs_f64(remaining.max(MIN_ATTEMPT_TIME));
        let attempt = Connection::open(address, attempt_time).and_then(|mut connection| {
            let available: bool = connection.is_available()?;
            Ok((connection, available))
        });
        match attempt {
            Ok((connection, true)) => match connection.set_job_timeout(io_timeout) {
                Ok(()) => {
                    info!("electronic structure server at {} is available", address);
                    return Ok(connection);
                }
                Err(error) => warn!(
                    "connection to the server at {} failed ({}): trying again in {:.1} s",
                    address, error, poll_interval
                ),
            },
            Ok((_, false)) => warn!(
                "electronic structure server at {} is busy: trying again in {:.1} s",
                address, poll_interval
            ),
            Err(error) => warn!(
                "electronic structure server at {} not available ({}): trying again in {:.1} s",
                address, error, poll_interval
            ),
        }
        let remaining: f64 = max_wait - start.elapsed().as_secs_f64();
        if remaining <= 0.0 {
            return Err(OracleFailure::Timeout(max_wait));
        }
        thread::sleep(Duration::from_secs_f64(poll_interval.min(remaining)));
        if start.elapsed().as_secs_f64() >= max_wait {
            return Err(OracleFailure::Timeout(max_wait));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::mpsc;

    #[test]
    fn closed_port_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address: String = listener.local_addr().unwrap().to_string();
        drop(listener);

        let failure = wait_until_available(&address, 0.3, 0.1, 0.0).err().unwrap();
        assert_eq!(failure, OracleFailure::Timeout(0.3));
    }

    #[test]
    fn busy_server_is_polled_again() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address: String = listener.local_addr().unwrap().to_string();
        let server = thread::spawn(move || {
            for (attempt, stream) in listener.incoming().take(2).enumerate() {
                let stream = stream.unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut writer = stream;
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let reply = ServerMessage::Status {
                    available: attempt > 0,
                };
                let text = format!("{}\n", serde_json::to_string(&reply).unwrap());
                writer.write_all(text.as_bytes()).unwrap();
            }
        });

        let mut connection = wait_until_available(&address, 2.0, 0.05, 1.0).unwrap();
        server.join().unwrap();
        // the server closed the connection after the handshake
        assert!(connection.is_available().is_err());
    }

    #[test]
    fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address: String = listener.local_addr().unwrap().to_string();
        // accepts every connection and never answers
        thread::spawn(move || {
            let mut streams: Vec<TcpStream> = Vec::new();
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => streams.push(stream),
                    Err(_) => break,
                }
            }
        });

        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let result = wait_until_available(&address, 0.5, 0.1, 0.0).map(|_| ());
            sender.send(result).unwrap();
        });
        let result = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result.err().unwrap(), OracleFailure::Timeout(0.5));
    }

    #[test]
    fn invalid_waits_are_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address: String = listener.local_addr().unwrap().to_string();
        for (max_wait, poll_interval) in [(1.0, 0.0), (1.0, -0.5), (-1.0, 0.1), (1.0, f64::NAN)] {
            assert!(matches!(
                wait_until_available(&address, max_wait, poll_interval, 0.0),
                Err(OracleFailure::Unavailable(_))
            ));
        }
    }
}

use crate::core::transport::{Transport, TransportEvent, TransportKind};
use crate::domain::descriptor::{FlowControl, Parity};
use crate::domain::error::{OpenError, SendError};
use async_trait::async_trait;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Read timeout on the device. Bounds both receive latency and how long a
/// close can take to unblock the receive loop.
const READ_TIMEOUT: Duration = Duration::from_millis(100);
const READ_BUFFER_SIZE: usize = 1024;

/// Serial port transport; owns one configured device handle.
///
/// The receive loop runs on a blocking thread with timeout-bounded reads
/// and watches a shutdown flag, so a close unblocks it within one read
/// timeout.
pub struct SerialTransport {
    writer: Option<Box<dyn SerialPort>>,
    shutdown: Arc<AtomicBool>,
    port_name: String,
}

impl SerialTransport {
    pub(crate) async fn open(
        port: &str,
        baud_rate: u32,
        data_bits: u8,
        stop_bits: u8,
        parity: Parity,
        flow_control: FlowControl,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Self, OpenError> {
        let data_bits = match data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => {
                return Err(OpenError::HandshakeFailed(format!(
                    "invalid data bits: {other}"
                )))
            }
        };
        let stop_bits = match stop_bits {
            1 => serialport::StopBits::One,
            2 => serialport::StopBits::Two,
            other => {
                return Err(OpenError::HandshakeFailed(format!(
                    "invalid stop bits: {other}"
                )))
            }
        };

        let builder = serialport::new(port, baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(match parity {
                Parity::None => serialport::Parity::None,
                Parity::Even => serialport::Parity::Even,
                Parity::Odd => serialport::Parity::Odd,
            })
            .flow_control(match flow_control {
                FlowControl::None => serialport::FlowControl::None,
                FlowControl::Software => serialport::FlowControl::Software,
                FlowControl::Hardware => serialport::FlowControl::Hardware,
            })
            .timeout(READ_TIMEOUT);

        let writer = builder.open().map_err(|e| map_serial_error(e, port))?;
        let reader = writer
            .try_clone()
            .map_err(|e| map_serial_error(e, port))?;
        info!("serial port {} opened at {} baud", port, baud_rate);

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        tokio::task::spawn_blocking(move || receive_loop(reader, flag, events));

        Ok(Self {
            writer: Some(writer),
            shutdown,
            port_name: port.to_string(),
        })
    }
}

fn map_serial_error(err: serialport::Error, port: &str) -> OpenError {
    match err.kind() {
        serialport::ErrorKind::NoDevice => OpenError::DeviceNotFound(port.to_string()),
        serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
            OpenError::DeviceNotFound(port.to_string())
        }
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            OpenError::PermissionDenied(port.to_string())
        }
        _ => OpenError::HandshakeFailed(format!("{port}: {err}")),
    }
}

fn receive_loop(
    mut reader: Box<dyn SerialPort>,
    shutdown: Arc<AtomicBool>,
    events: mpsc::Sender<TransportEvent>,
) {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        match reader.read(&mut buffer) {
            Ok(0) => continue,
            Ok(n) => {
                debug!("received {} bytes over serial", n);
                if events
                    .blocking_send(TransportEvent::Data(buffer[..n].to_vec()))
                    .is_err()
                {
                    break;
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if !shutdown.load(Ordering::SeqCst) {
                    let _ = events.blocking_send(TransportEvent::Fault(e.to_string()));
                }
                break;
            }
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), SendError> {
        let writer = self.writer.as_mut().ok_or(SendError::NotConnected)?;
        writer
            .write_all(data)
            .map_err(|e| SendError::PeerUnreachable(e.to_string()))?;
        debug!("sent {} bytes over serial", data.len());
        Ok(())
    }

    async fn close(&mut self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the writer releases the device; the receive loop sees
        // the flag within one read timeout and drops its clone.
        self.writer = None;
        info!("serial port {} closed", self.port_name);
    }
}

//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Trait for serial port I/O operations
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;

    /// Read available bytes; `Ok(0)` means the port was closed
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Wrapper around an async byte stream (normally `tokio_serial::SerialStream`)
/// that implements SerialPortIO
pub struct TokioSerialPort<S = tokio_serial::SerialStream> {
    port: S,
}

impl<S> TokioSerialPort<S> {
    pub fn new(port: S) -> Self {
        Self { port }
    }
}

#[async_trait]
impl<S> SerialPortIO for TokioSerialPort<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port.flush().await
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_port_passes_bytes_through() {
        let mock = tokio_test::io::Builder::new()
            .write(&[0x7E, 0x00])
            .read(&[0x7E, 0x01, 0x02])
            .build();
        let mut port = TokioSerialPort::new(mock);

        port.write_all(&[0x7E, 0x00]).await.unwrap();
        port.flush().await.unwrap();

        let mut buf = [0u8; 8];
        let n = port.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x7E, 0x01, 0x02]);
    }

    #[tokio::test]
    async fn test_stream_port_reports_eof() {
        let mock = tokio_test::io::Builder::new().build();
        let mut port = TokioSerialPort::new(mock);

        let mut buf = [0u8; 8];
        assert_eq!(port.read(&mut buf).await.unwrap(), 0);
    }
}

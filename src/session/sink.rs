use std::{io::ErrorKind, time::Duration};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    time::timeout,
};

use crate::{pubsub::Event, pubsub::EventPayload, DeliveryError};

/// Получатель событий сессии: транспорт клиента или внутрипроцессный
/// адаптер.
///
/// Ошибка доставки завершает только ту сессию, которой принадлежит sink.
#[async_trait]
pub trait EventSink: Send {
    async fn deliver(
        &mut self,
        event: &Event,
    ) -> Result<(), DeliveryError>;
}

/// Кадр на проводе: `{"topic": "...", "event": {...}}`.
#[derive(Serialize)]
struct WireFrame<'a> {
    topic: &'a str,
    event: &'a EventPayload,
}

/// Кодирует событие в одну JSON-строку, завершённую `\n`.
pub fn encode_frame(event: &Event) -> Result<Bytes, DeliveryError> {
    let frame = WireFrame {
        topic: event.topic(),
        event: event.payload(),
    };
    let mut buf = BytesMut::with_capacity(128).writer();
    serde_json::to_writer(&mut buf, &frame).map_err(|e| DeliveryError::Encode {
        topic: event.topic().to_string(),
        reason: e.to_string(),
    })?;
    let mut buf = buf.into_inner();
    buf.put_u8(b'\n');
    Ok(buf.freeze())
}

/// Пишет каждое событие отдельной JSON-строкой в любой `AsyncWrite`.
///
/// Каждая запись ограничена таймаутом: медленный клиент не может держать
/// сессию дольше `write_timeout` на одном событии.
pub struct JsonLinesSink<W> {
    writer: W,
    write_timeout: Duration,
    frames_written: u64,
    bytes_written: u64,
    mid_frame: bool,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(
        writer: W,
        write_timeout: Duration,
    ) -> Self {
        Self {
            writer,
            write_timeout,
            frames_written: 0,
            bytes_written: 0,
            mid_frame: false,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Запись кадра была прервана (future `deliver` сброшен посреди
    /// записи). Поток больше не выровнен по строкам.
    pub fn is_mid_frame(&self) -> bool {
        self.mid_frame
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> EventSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn deliver(
        &mut self,
        event: &Event,
    ) -> Result<(), DeliveryError> {
        let frame = encode_frame(event)?;
        self.mid_frame = true;
        let writer = &mut self.writer;
        let write = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        };

        match timeout(self.write_timeout, write).await {
            Ok(Ok(())) => {
                self.mid_frame = false;
                self.frames_written += 1;
                self.bytes_written += frame.len() as u64;
                Ok(())
            }
            Ok(Err(e)) => Err(map_io_error(&e)),
            Err(_) => Err(DeliveryError::WriteTimeout {
                timeout_ms: self.write_timeout.as_millis() as u64,
            }),
        }
    }
}

fn map_io_error(err: &std::io::Error) -> DeliveryError {
    match err.kind() {
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::WriteZero => DeliveryError::TransportClosed,
        _ => DeliveryError::Write {
            reason: err.to_string(),
        },
    }
}

/// Внутрипроцессный адаптер: событие пересылается в канал.
///
/// Ожидает свободного места в канале; закрытый приёмник считается
/// отключением клиента.
#[async_trait]
impl EventSink for mpsc::Sender<Event> {
    async fn deliver(
        &mut self,
        event: &Event,
    ) -> Result<(), DeliveryError> {
        self.send(event.clone())
            .await
            .map_err(|_| DeliveryError::TransportClosed)
    }
}

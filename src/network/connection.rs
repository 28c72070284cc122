use std::{
    io::ErrorKind,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    select,
    sync::{Notify, Semaphore},
    time::{timeout, Instant},
};
use tracing::{debug, error, info, trace, warn};

use super::{command::Command, AppState};
use crate::{
    config::ServerSettings,
    pubsub::CancelHandle,
    session::{CloseReason, JsonLinesSink, SubscriptionSession},
    ErrorExt, LogLevel, NetworkError, StackError,
};

/// Конфигурация обработки соединений.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Максимальное кол-во одновременных соединений
    pub max_connections: usize,
    /// Таймаут чтения команды в командном режиме
    pub read_timeout: Duration,
    /// Таймаут записи ответа или события
    pub write_timeout: Duration,
    /// Сколько ждать закрытия соединений при остановке
    pub shutdown_timeout: Duration,
    /// Размер буфера для чтения
    pub read_buffer_size: usize,
}

/// Менеджер соединений: лимит одновременных соединений и graceful shutdown.
#[derive(Debug)]
pub struct ConnectionManager {
    config: ConnectionConfig,
    connection_semaphore: Arc<Semaphore>,
    /// Общий счётчик активных соединений
    active_connections: Arc<AtomicUsize>,
    shutdown_signal: Arc<Notify>,
    /// Флаг остановки: `Notify` будит только тех, кто уже ждёт
    shutting_down: Arc<AtomicBool>,
    /// Счётчик для генерации ID соединений
    connection_counter: Arc<AtomicU32>,
}

/// Обработчик отдельного соединения.
struct ConnectionHandler {
    connection_id: u32,
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    addr: SocketAddr,
    state: AppState,
    config: ConnectionConfig,
    shutdown_signal: Arc<Notify>,
    shutting_down: Arc<AtomicBool>,
}

/// Что делать с соединением после обработки команды.
enum Flow {
    Continue,
    Close,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            connection_semaphore: Arc::new(Semaphore::new(config.max_connections)),
            config,
            active_connections: Arc::new(AtomicUsize::new(0)),
            shutdown_signal: Arc::new(Notify::new()),
            shutting_down: Arc::new(AtomicBool::new(false)),
            connection_counter: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Текущее кол-во активных соединений.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Инициирует graceful shutdown всех соединений.
    pub fn shutdown(&self) {
        info!(
            active = self.active_connections(),
            "initiating graceful shutdown for connection manager"
        );
        self.shutting_down.store(true, Ordering::Release);
        self.shutdown_signal.notify_waiters();
    }

    /// Ждёт завершения всех активных соединений.
    pub async fn wait_for_shutdown(
        &self,
        timeout_duration: Duration,
    ) -> Result<()> {
        let start = Instant::now();

        while self.active_connections() > 0 {
            if start.elapsed() > timeout_duration {
                warn!(
                    active = self.active_connections(),
                    "shutdown timeout reached with active connections"
                );
                return Err(anyhow!("Shutdown timeout exceeded"));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        info!("all connections closed gracefully");
        Ok(())
    }

    /// Обрабатывает новое соединение до его закрытия.
    ///
    /// При превышении лимита клиент получает `-ERR` и соединение сразу
    /// закрывается.
    pub async fn handle_connection(
        &self,
        mut socket: TcpStream,
        addr: SocketAddr,
        state: AppState,
    ) -> Result<()> {
        let _permit = match self.connection_semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let err = NetworkError::TooManyConnections(self.config.max_connections);
                warn!(client = %addr, error = %err, "connection rejected");
                let reply = format!("-ERR {}\r\n", err.client_message());
                let _ = timeout(self.config.write_timeout, socket.write_all(reply.as_bytes())).await;
                return Err(err.into());
            }
        };

        let active = self.active_connections.fetch_add(1, Ordering::Relaxed) + 1;
        let connection_id = self.connection_counter.fetch_add(1, Ordering::Relaxed) + 1;
        info!(connection_id, client = %addr, active, "connection established");

        let handler = ConnectionHandler::new(
            connection_id,
            socket,
            addr,
            state,
            self.config.clone(),
            self.shutdown_signal.clone(),
            self.shutting_down.clone(),
        );
        let result = handler.run().await;

        let remaining = self.active_connections.fetch_sub(1, Ordering::Relaxed) - 1;
        match &result {
            Ok(()) => debug!(connection_id, client = %addr, remaining, "connection closed"),
            Err(e) => error!(
                connection_id,
                client = %addr,
                remaining,
                error = %e,
                "connection closed with error"
            ),
        }
        result
    }
}

impl ConnectionHandler {
    fn new(
        connection_id: u32,
        socket: TcpStream,
        addr: SocketAddr,
        state: AppState,
        config: ConnectionConfig,
        shutdown_signal: Arc<Notify>,
        shutting_down: Arc<AtomicBool>,
    ) -> Self {
        let (read_half, write_half) = socket.into_split();
        let lines = BufReader::with_capacity(config.read_buffer_size, read_half).lines();

        Self {
            connection_id,
            lines,
            writer: write_half,
            addr,
            state,
            config,
            shutdown_signal,
            shutting_down,
        }
    }

    /// Основной цикл обработки соединения в командном режиме.
    async fn run(mut self) -> Result<()> {
        loop {
            if self.shutting_down.load(Ordering::Acquire) {
                self.send("-ERR Server shutting down\r\n").await?;
                break;
            }

            let line = select! {
                _ = self.shutdown_signal.notified() => continue,
                read = timeout(self.config.read_timeout, self.lines.next_line()) => read,
            };

            match line {
                Ok(Ok(Some(line))) => {
                    trace!(connection_id = self.connection_id, command = line.trim(), "received");
                    if line.trim().is_empty() {
                        continue;
                    }
                    match self.dispatch(&line).await? {
                        Flow::Continue => {}
                        Flow::Close => break,
                    }
                }
                Ok(Ok(None)) => {
                    debug!(connection_id = self.connection_id, client = %self.addr, "client closed connection");
                    break;
                }
                Ok(Err(e)) => {
                    if e.kind() == ErrorKind::InvalidData {
                        warn!(connection_id = self.connection_id, "ignoring invalid UTF-8 from client");
                        self.send("-ERR Invalid UTF-8\r\n").await?;
                        continue;
                    }
                    if is_recoverable_error(&e) {
                        debug!(connection_id = self.connection_id, error = %e, "recoverable read error");
                        break;
                    }
                    return Err(e).context("Fatal read error");
                }
                Err(_) => {
                    warn!(connection_id = self.connection_id, client = %self.addr, "read timeout");
                    let _ = self.send("-ERR Read timeout\r\n").await;
                    break;
                }
            }
        }

        self.graceful_close().await;
        Ok(())
    }

    /// Выполняет одну команду и отправляет ответ.
    async fn dispatch(
        &mut self,
        line: &str,
    ) -> Result<Flow> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                debug!(connection_id = self.connection_id, error = %e, "invalid command");
                self.send(&error_reply(&e)).await?;
                return Ok(Flow::Continue);
            }
        };

        let service = &self.state.service;
        let reply = match command {
            Command::Ping(None) => "+PONG\r\n".to_string(),
            Command::Ping(Some(msg)) => format!("+{msg}\r\n"),
            Command::Quit => {
                self.send("+OK\r\n").await?;
                info!(connection_id = self.connection_id, "client sent QUIT, closing");
                return Ok(Flow::Close);
            }
            Command::Vehicles => {
                json_reply(self.connection_id, "VEHICLES", service.list_vehicles().await)
            }
            Command::Vehicle(id) => {
                json_reply(self.connection_id, "VEHICLE", service.get_vehicle(&id).await)
            }
            Command::AddVehicle(vehicle) => json_reply(
                self.connection_id,
                "ADDVEHICLE",
                service.create_vehicle(vehicle).await,
            ),
            Command::Move { id, coordinates } => json_reply(
                self.connection_id,
                "MOVE",
                service.update_location(&id, coordinates).await,
            ),
            Command::Reviews(vehicle_id) => json_reply(
                self.connection_id,
                "REVIEWS",
                service.list_reviews(&vehicle_id).await,
            ),
            Command::AddReview(review) => json_reply(
                self.connection_id,
                "ADDREVIEW",
                service.create_review(review).await,
            ),
            Command::Stats => json_line(&self.state.registry.stats()),
            Command::Unsubscribe => "-ERR Not subscribed\r\n".to_string(),
            Command::Subscribe(topic) => return self.subscribe(topic).await,
        };

        self.send(&reply).await?;
        Ok(Flow::Continue)
    }

    /// Режим подписки: соединение принадлежит сессии, пока клиент не
    /// отпишется, не отключится или доставка не сорвётся.
    async fn subscribe(
        &mut self,
        topic: String,
    ) -> Result<Flow> {
        let mut session = SubscriptionSession::new(self.state.registry.clone(), topic.clone());
        let cancel = session
            .activate()
            .map_err(|e| anyhow!("failed to activate session: {e}"))?;
        self.send(&format!("+OK subscribed {topic}\r\n")).await?;

        let (summary, mid_frame) = {
            let mut sink = JsonLinesSink::new(&mut self.writer, self.config.write_timeout);
            let watch = watch_client(
                self.connection_id,
                &mut self.lines,
                cancel,
                &self.shutdown_signal,
                &self.shutting_down,
            );
            let summary = session.run(&mut sink, watch).await;
            (summary, sink.is_mid_frame())
        };

        info!(
            connection_id = self.connection_id,
            subscription = %summary.id,
            topic = %summary.topic,
            reason = %summary.reason,
            delivered = summary.delivered,
            dropped = summary.dropped,
            "subscription ended"
        );

        if mid_frame {
            // Кадр оборван на середине строки: вернуться в командный режим
            // нельзя, клиент не отличит ответ от хвоста события.
            warn!(
                connection_id = self.connection_id,
                topic = %topic,
                "subscription ended mid-frame, closing connection"
            );
            return Ok(Flow::Close);
        }

        match summary.reason {
            CloseReason::Cancelled if !self.shutting_down.load(Ordering::Acquire) => {
                self.send(&format!("+OK unsubscribed {topic}\r\n")).await?;
                Ok(Flow::Continue)
            }
            CloseReason::Cancelled => Ok(Flow::Continue),
            CloseReason::TransportClosed | CloseReason::DeliveryFailed(_) => Ok(Flow::Close),
        }
    }

    async fn send(
        &mut self,
        response: &str,
    ) -> Result<()> {
        timeout(self.config.write_timeout, self.writer.write_all(response.as_bytes()))
            .await
            .context("Write timeout")?
            .context("Failed to write response")?;
        Ok(())
    }

    async fn graceful_close(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            if e.kind() != ErrorKind::NotConnected {
                debug!(connection_id = self.connection_id, error = %e, "error during shutdown");
            }
        }
        debug!(connection_id = self.connection_id, "connection closed gracefully");
    }
}

/// Следит за входящим потоком, пока соединение в режиме подписки.
///
/// Завершается, когда транспорт закрыт (EOF, ошибка, `QUIT`, остановка
/// сервера). `UNSUBSCRIBE` отменяет подписку; после этого future больше
/// не завершается, и сессия выходит по отмене.
async fn watch_client(
    connection_id: u32,
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    cancel: CancelHandle,
    shutdown_signal: &Notify,
    shutting_down: &AtomicBool,
) {
    loop {
        if shutting_down.load(Ordering::Acquire) {
            return;
        }
        let line = select! {
            _ = shutdown_signal.notified() => return,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) => match line.trim().to_ascii_uppercase().as_str() {
                "UNSUBSCRIBE" => {
                    cancel.cancel();
                    std::future::pending::<()>().await;
                }
                "QUIT" => return,
                "" => {}
                other => {
                    debug!(connection_id, command = other, "ignored while subscribed");
                }
            },
            Ok(None) => return,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!(connection_id, "ignoring invalid UTF-8 from subscriber");
            }
            Err(e) => {
                debug!(connection_id, error = %e, "subscriber read failed");
                return;
            }
        }
    }
}

fn json_line<T: Serialize>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(json) => format!("{json}\r\n"),
        Err(e) => {
            error!(error = %e, "failed to serialize reply");
            "-ERR Internal server error\r\n".to_string()
        }
    }
}

/// Ответ на команду сервиса: JSON при успехе, `-ERR` с безопасным
/// сообщением при ошибке.
fn json_reply<T, E>(
    connection_id: u32,
    command: &'static str,
    result: std::result::Result<T, E>,
) -> String
where
    T: Serialize,
    E: ErrorExt,
{
    match result {
        Ok(value) => json_line(&value),
        Err(e) => {
            let err = StackError::new(e).context(command);
            log_command_error(connection_id, &err);
            format!("-ERR {}\r\n", err.client_message())
        }
    }
}

/// Пишет ошибку команды с уровнем, который задаёт её статус-код.
fn log_command_error(
    connection_id: u32,
    err: &StackError,
) {
    let code = err.status_code();
    let tags = err.metrics_tags();
    match err.log_level() {
        LogLevel::Error => error!(connection_id, %code, ?tags, error = ?err, "command failed"),
        LogLevel::Warn => warn!(connection_id, %code, ?tags, error = ?err, "command failed"),
        LogLevel::Info => info!(connection_id, %code, ?tags, error = %err, "command failed"),
        LogLevel::Debug => debug!(connection_id, %code, ?tags, error = %err, "command failed"),
        LogLevel::Trace => trace!(connection_id, %code, error = %err, "command failed"),
    }
}

fn error_reply<E: ErrorExt>(err: &E) -> String {
    format!("-ERR {}\r\n", err.client_message())
}

/// Проверяет, является ли ошибка чтения штатным закрытием соединения.
fn is_recoverable_error(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::UnexpectedEof
            | ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::TimedOut
    )
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ConnectionConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            max_connections: settings.max_connections,
            read_timeout: settings.read_timeout(),
            write_timeout: settings.write_timeout(),
            shutdown_timeout: settings.shutdown_timeout(),
            read_buffer_size: 8192,
        }
    }
}

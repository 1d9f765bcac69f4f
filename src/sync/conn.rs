use std::io::Write;
use std::net::TcpStream;

use tracing::{debug, instrument, trace};

use crate::buffer::BufferSet;
use crate::col::{Column, ColumnDefinitionBytes};
use crate::constant::{
    CapabilityFlags, CAPABILITIES_ALWAYS_ENABLED, CAPABILITIES_CONFIGURABLE, CAPABILITIES_REQUIRED,
};
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::prepared::PreparedStatement;
use crate::protocol::command::prepared::{
    read_prepare_ok, write_close_statement, write_execute, write_prepare, write_reset_statement,
    Exec, ExecEvent,
};
use crate::protocol::command::query::{write_query, Query, QueryEvent};
use crate::protocol::command::utility::{write_ping, write_quit};
use crate::protocol::connection::auth::{self, FAST_AUTH_SUCCESS, PERFORM_FULL_AUTH};
use crate::protocol::connection::{
    read_auth_more_data, read_auth_switch_request, read_initial_handshake,
    write_handshake_response, HandshakeResponse41,
};
use crate::protocol::packet::{
    self, write_packet_header_array, MAX_PAYLOAD_PER_PACKET,
};
use crate::protocol::r#trait::{BinaryResultSetHandler, Params, TextResultSetHandler};
use crate::protocol::response::{ErrPayload, OkPayload};
use crate::sync::stream::Stream;

const MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    /// Ready for the next command
    Ready,
    /// A fatal error left the stream out of sync; only close() is useful
    Broken,
    /// COM_QUIT sent or transport shut down
    Closed,
}

/// A MySQL connection over a buffered byte stream.
///
/// The connection is single-owner and strictly half-duplex: each command
/// fully drains its response (result handlers are driven to the terminator)
/// before the method returns, so no command can overlap another. The
/// per-command sequence counter resets to 0 at every command start and
/// every received frame is checked against it.
#[derive(Debug)]
pub struct Conn {
    stream: Stream,
    bufs: BufferSet,
    server_version: String,
    connection_id: u32,
    capability_flags: CapabilityFlags,
    sequence_id: u8,
    state: ConnState,
}

impl Conn {
    /// Connect and authenticate using a `mysql://` URL.
    pub fn new(url: &str) -> Result<Self> {
        Self::connect(&Opts::try_from(url)?)
    }

    /// Connect and authenticate.
    ///
    /// Dials TCP (or a Unix socket when configured), reads the server
    /// greeting, negotiates capabilities, and runs the auth exchange to an
    /// OK or ERR packet.
    #[instrument(skip_all, fields(host = %opts.host, port = opts.port))]
    pub fn connect(opts: &Opts) -> Result<Self> {
        let mut stream = match &opts.socket {
            #[cfg(unix)]
            Some(path) => Stream::unix(std::os::unix::net::UnixStream::connect(path)?),
            #[cfg(not(unix))]
            Some(_) => {
                return Err(Error::BadConfig("unix sockets are not supported here".into()))
            }
            None => {
                let tcp = TcpStream::connect(opts.address())?;
                if opts.tcp_nodelay {
                    tcp.set_nodelay(true)?;
                }
                Stream::tcp(tcp)
            }
        };

        let mut bufs = BufferSet::new();
        let mut sequence_id = 0u8;

        // ─── Greeting ────────────────────────────────────────────────
        packet::read_payload(&mut stream, &mut sequence_id, &mut bufs.read_buffer)?;
        match bufs.read_buffer.first() {
            Some(&0xff) => return Err(ErrPayload::parse(&bufs.read_buffer)?.into()),
            Some(&10) => {}
            first => {
                return Err(Error::UnexpectedPacket {
                    first_byte: first.copied().unwrap_or(0),
                    phase: "reading server greeting",
                })
            }
        }
        let handshake = read_initial_handshake(&bufs.read_buffer)?;
        debug!(
            server_version = %handshake.server_version,
            connection_id = handshake.connection_id,
            plugin = %handshake.auth_plugin_name,
            "greeted"
        );

        if !handshake
            .capability_flags
            .contains(CapabilityFlags::CLIENT_PROTOCOL_41)
        {
            return Err(Error::UnsupportedProtocol);
        }

        // ─── Capability Negotiation ──────────────────────────────────
        let mut client_caps =
            CAPABILITIES_ALWAYS_ENABLED | (opts.capabilities & CAPABILITIES_CONFIGURABLE);
        if opts.db.is_some() {
            client_caps |= CapabilityFlags::CLIENT_CONNECT_WITH_DB;
        }
        let capability_flags = (client_caps & handshake.capability_flags) | CAPABILITIES_REQUIRED;

        // ─── Handshake Response ──────────────────────────────────────
        let plugin_name = if handshake.auth_plugin_name.is_empty() {
            auth::CACHING_SHA2_PASSWORD
        } else {
            handshake.auth_plugin_name.as_str()
        };
        let auth_response =
            auth::auth_response(plugin_name, &opts.password, &handshake.auth_plugin_data)?;

        let mut out = Vec::new();
        write_handshake_response(
            &mut out,
            &HandshakeResponse41 {
                capability_flags,
                max_packet_size: MAX_PACKET_SIZE,
                charset: opts.collation,
                username: &opts.user,
                auth_response: &auth_response,
                database: opts.db.as_deref(),
                auth_plugin_name: Some(plugin_name),
            },
        );
        packet::write_payload(&mut stream, &mut sequence_id, &out)?;
        stream.flush()?;

        // ─── Auth Exchange ───────────────────────────────────────────
        // The only place with local recovery: switch and more-data rounds
        // repeat until the server settles on OK or ERR.
        loop {
            packet::read_payload(&mut stream, &mut sequence_id, &mut bufs.read_buffer)?;
            match bufs.read_buffer.first() {
                Some(&0x00) => {
                    OkPayload::parse(&bufs.read_buffer)?;
                    break;
                }
                Some(&0xff) => return Err(ErrPayload::parse(&bufs.read_buffer)?.into()),
                Some(&0xfe) => {
                    let switch = read_auth_switch_request(&bufs.read_buffer)?;
                    trace!(plugin = %switch.plugin_name, "auth switch");
                    // The challenge input is the plugin data carried by
                    // the switch packet itself.
                    let response = auth::auth_response(
                        &switch.plugin_name,
                        &opts.password,
                        &switch.plugin_data,
                    )?;
                    packet::write_payload(&mut stream, &mut sequence_id, &response)?;
                    stream.flush()?;
                }
                Some(&0x01) => {
                    let data = read_auth_more_data(&bufs.read_buffer)?;
                    match data {
                        [FAST_AUTH_SUCCESS] => {
                            trace!("fast auth success");
                            // The final OK follows on the next packet.
                        }
                        [PERFORM_FULL_AUTH] => {
                            return Err(Error::Unsupported(
                                "caching_sha2_password full authentication (requires TLS or RSA)",
                            ))
                        }
                        tail => {
                            // Fresh plugin data: answer the new challenge.
                            let response =
                                auth::auth_response(plugin_name, &opts.password, tail)?;
                            packet::write_payload(&mut stream, &mut sequence_id, &response)?;
                            stream.flush()?;
                        }
                    }
                }
                first => {
                    return Err(Error::UnexpectedPacket {
                        first_byte: first.copied().unwrap_or(0),
                        phase: "authenticating",
                    })
                }
            }
        }

        debug!("connected");
        Ok(Self {
            stream,
            bufs,
            server_version: handshake.server_version,
            connection_id: handshake.connection_id,
            capability_flags,
            sequence_id,
            state: ConnState::Ready,
        })
    }

    /// Server version string from the greeting
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Server-assigned connection (thread) id
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    /// Effective capabilities after negotiation
    pub fn capability_flags(&self) -> CapabilityFlags {
        self.capability_flags
    }

    // ─── Command Plumbing ────────────────────────────────────────────

    /// Gate every command: a broken or closed connection fails fast, a
    /// healthy one resets the sequence counter.
    fn begin_command(&mut self) -> Result<()> {
        match self.state {
            ConnState::Ready => {
                self.sequence_id = 0;
                Ok(())
            }
            ConnState::Broken => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection is poisoned by an earlier protocol error",
            ))),
            ConnState::Closed => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection is closed",
            ))),
        }
    }

    /// Flush the assembled command in the write buffer as one packet.
    ///
    /// The buffer carries a 4-byte header reservation, so the common small
    /// command goes to the socket with a single write once the header is
    /// patched in place.
    fn send_command(&mut self) -> Result<()> {
        let payload_len = self.bufs.payload_len();
        if payload_len < MAX_PAYLOAD_PER_PACKET {
            let header = write_packet_header_array(self.sequence_id, payload_len);
            self.bufs.write_buffer[..4].copy_from_slice(&header);
            self.sequence_id = self.sequence_id.wrapping_add(1);
            self.stream.write_all(&self.bufs.write_buffer)?;
        } else {
            packet::write_payload(
                &mut self.stream,
                &mut self.sequence_id,
                &self.bufs.write_buffer[4..],
            )?;
        }
        self.stream.flush()?;
        Ok(())
    }

    fn read_packet(&mut self) -> Result<()> {
        packet::read_payload(
            &mut self.stream,
            &mut self.sequence_id,
            &mut self.bufs.read_buffer,
        )
    }

    /// Record connection poisoning on the way out of a command.
    ///
    /// Server errors arrive in complete ERR packets, so the stream stays
    /// in sync and the caller decides whether to continue. Everything else
    /// that breaks the connection flips it to `Broken`.
    fn seal<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if !matches!(err, Error::Server { .. }) && err.is_conn_broken() {
                self.state = ConnState::Broken;
            }
        }
        result
    }

    // ─── Text Protocol ───────────────────────────────────────────────

    /// Execute a text-protocol query, streaming the result through the
    /// handler. The result is fully drained before this returns.
    #[instrument(skip_all, fields(sql = %sql))]
    pub fn query<H>(&mut self, sql: &str, handler: &mut H) -> Result<()>
    where
        H: TextResultSetHandler,
    {
        let result = self.query_inner(sql, handler);
        self.seal(result)
    }

    fn query_inner<H>(&mut self, sql: &str, handler: &mut H) -> Result<()>
    where
        H: TextResultSetHandler,
    {
        self.begin_command()?;
        write_query(self.bufs.new_write_buffer(), sql);
        self.send_command()?;

        let mut sm = Query::new();
        let mut started = false;
        self.bufs.columns.clear();
        loop {
            self.read_packet()?;
            let caps = self.capability_flags;
            match sm.drive(&self.bufs.read_buffer, caps)? {
                QueryEvent::NeedPayload => {}
                QueryEvent::NoResultSet(ok) => return handler.no_result_set(ok),
                QueryEvent::ResultSetStart { .. } => {}
                QueryEvent::Column(col) => {
                    self.bufs.columns.push(Column::parse(col)?);
                }
                QueryEvent::Row(row) => {
                    if !started {
                        handler.resultset_start(&self.bufs.columns)?;
                        started = true;
                    }
                    handler.row(&self.bufs.columns, row)?;
                }
                QueryEvent::Eof(ok) => {
                    if !started {
                        handler.resultset_start(&self.bufs.columns)?;
                    }
                    return handler.resultset_end(ok);
                }
            }
        }
    }

    /// Execute a text-protocol query and discard any result rows.
    ///
    /// The usual shape for DDL and for INSERT/UPDATE/DELETE without
    /// RETURNING semantics; returns the final OK payload.
    pub fn query_drop(&mut self, sql: &str) -> Result<OkPayload> {
        let mut sink = DropHandler::default();
        self.query(sql, &mut sink)?;
        sink.into_ok()
    }

    // ─── Prepared Statements ─────────────────────────────────────────

    /// Prepare a statement and read its parameter and column metadata.
    #[instrument(skip_all, fields(sql = %sql))]
    pub fn prepare(&mut self, sql: &str) -> Result<PreparedStatement> {
        let result = self.prepare_inner(sql);
        self.seal(result)
    }

    fn prepare_inner(&mut self, sql: &str) -> Result<PreparedStatement> {
        self.begin_command()?;
        write_prepare(self.bufs.new_write_buffer(), sql);
        self.send_command()?;

        self.read_packet()?;
        let (statement_id, num_columns, num_params, warning_count) = {
            let ok = read_prepare_ok(&self.bufs.read_buffer)?;
            (
                ok.statement_id.get(),
                ok.num_columns.get(),
                ok.num_params.get(),
                ok.warning_count.get(),
            )
        };
        trace!(statement_id, num_params, num_columns, "prepared");

        let params = self.read_definition_block(num_params as usize)?;
        let columns = self.read_definition_block(num_columns as usize)?;

        Ok(PreparedStatement::new(
            statement_id,
            num_params,
            num_columns,
            warning_count,
            params,
            columns,
        ))
    }

    /// Read `count` column definition packets plus the legacy EOF that
    /// closes the block when CLIENT_DEPRECATE_EOF was not negotiated.
    fn read_definition_block(&mut self, count: usize) -> Result<Vec<Column>> {
        let mut definitions = Vec::with_capacity(count);
        if count == 0 {
            return Ok(definitions);
        }
        for _ in 0..count {
            self.read_packet()?;
            definitions.push(Column::parse(ColumnDefinitionBytes(&self.bufs.read_buffer))?);
        }
        if !self
            .capability_flags
            .contains(CapabilityFlags::CLIENT_DEPRECATE_EOF)
        {
            self.read_packet()?;
            if self.bufs.read_buffer.first() != Some(&0xfe) {
                return Err(Error::UnexpectedPacket {
                    first_byte: self.bufs.read_buffer.first().copied().unwrap_or(0),
                    phase: "expecting EOF after definition block",
                });
            }
        }
        Ok(definitions)
    }

    /// Execute a prepared statement, streaming binary rows through the
    /// handler. The result is fully drained before this returns.
    #[instrument(skip_all, fields(statement_id = stmt.id()))]
    pub fn exec<P, H>(&mut self, stmt: &PreparedStatement, params: P, handler: &mut H) -> Result<()>
    where
        P: Params,
        H: BinaryResultSetHandler,
    {
        let result = self.exec_inner(stmt, params, handler);
        self.seal(result)
    }

    fn exec_inner<P, H>(
        &mut self,
        stmt: &PreparedStatement,
        params: P,
        handler: &mut H,
    ) -> Result<()>
    where
        P: Params,
        H: BinaryResultSetHandler,
    {
        if params.len() != stmt.num_params() {
            return Err(Error::ParamsCountMismatch {
                expected: stmt.num_params(),
                actual: params.len(),
            });
        }

        self.begin_command()?;
        write_execute(self.bufs.new_write_buffer(), stmt.id(), &params)?;
        self.send_command()?;

        let mut sm = Exec::new();
        let mut started = false;
        self.bufs.columns.clear();
        loop {
            self.read_packet()?;
            let caps = self.capability_flags;
            match sm.drive(&self.bufs.read_buffer, caps)? {
                ExecEvent::NeedPayload => {}
                ExecEvent::NoResultSet(ok) => return handler.no_result_set(ok),
                ExecEvent::ResultSetStart { .. } => {}
                ExecEvent::Column(col) => {
                    self.bufs.columns.push(Column::parse(col)?);
                }
                ExecEvent::Row(row) => {
                    if !started {
                        handler.resultset_start(&self.bufs.columns)?;
                        started = true;
                    }
                    handler.row(&self.bufs.columns, row)?;
                }
                ExecEvent::Eof(ok) => {
                    if !started {
                        handler.resultset_start(&self.bufs.columns)?;
                    }
                    return handler.resultset_end(ok);
                }
            }
        }
    }

    /// Execute a prepared statement and discard any result rows.
    pub fn exec_drop<P>(&mut self, stmt: &PreparedStatement, params: P) -> Result<OkPayload>
    where
        P: Params,
    {
        let mut sink = DropHandler::default();
        self.exec(stmt, params, &mut sink)?;
        sink.into_ok()
    }

    /// Free the server-side statement handle. COM_STMT_CLOSE has no
    /// response packet.
    pub fn close_statement(&mut self, stmt: PreparedStatement) -> Result<()> {
        let result = (|| {
            self.begin_command()?;
            write_close_statement(self.bufs.new_write_buffer(), stmt.id());
            self.send_command()
        })();
        self.seal(result)
    }

    /// Reset a prepared statement on the server, clearing accumulated
    /// long data. Expects OK or ERR.
    pub fn reset_statement(&mut self, stmt: &PreparedStatement) -> Result<OkPayload> {
        let result = (|| {
            self.begin_command()?;
            write_reset_statement(self.bufs.new_write_buffer(), stmt.id());
            self.send_command()?;
            self.read_ok_response("resetting statement")
        })();
        self.seal(result)
    }

    // ─── Utility Commands ────────────────────────────────────────────

    /// COM_PING round trip
    pub fn ping(&mut self) -> Result<()> {
        let result = (|| {
            self.begin_command()?;
            write_ping(self.bufs.new_write_buffer());
            self.send_command()?;
            self.read_ok_response("pinging").map(drop)
        })();
        self.seal(result)
    }

    fn read_ok_response(&mut self, phase: &'static str) -> Result<OkPayload> {
        self.read_packet()?;
        match self.bufs.read_buffer.first() {
            Some(&0x00) | Some(&0xfe) => OkPayload::parse(&self.bufs.read_buffer),
            Some(&0xff) => Err(ErrPayload::parse(&self.bufs.read_buffer)?.into()),
            first => Err(Error::UnexpectedPacket {
                first_byte: first.copied().unwrap_or(0),
                phase,
            }),
        }
    }

    /// Send COM_QUIT (best effort) and shut the transport down.
    pub fn close(mut self) -> Result<()> {
        if self.state == ConnState::Ready {
            self.sequence_id = 0;
            write_quit(self.bufs.new_write_buffer());
            // The server may drop the link before the quit is read.
            let _ = self.send_command();
        }
        self.state = ConnState::Closed;
        match self.stream.shutdown() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Handler that drains a result set, keeping only the terminating OK.
#[derive(Default)]
struct DropHandler {
    ok: Option<OkPayload>,
}

impl DropHandler {
    fn into_ok(self) -> Result<OkPayload> {
        // Both state machines end every completed result with an OK/EOF
        // event, so the option is filled on every success path.
        self.ok.ok_or(Error::Decode("result stream ended without a terminator"))
    }
}

impl TextResultSetHandler for DropHandler {
    fn no_result_set(&mut self, ok: OkPayload) -> Result<()> {
        self.ok = Some(ok);
        Ok(())
    }

    fn resultset_start(&mut self, _columns: &[Column]) -> Result<()> {
        Ok(())
    }

    fn row(&mut self, _columns: &[Column], _row: crate::row::TextRowPayload<'_>) -> Result<()> {
        Ok(())
    }

    fn resultset_end(&mut self, ok: OkPayload) -> Result<()> {
        self.ok = Some(ok);
        Ok(())
    }
}

impl BinaryResultSetHandler for DropHandler {
    fn no_result_set(&mut self, ok: OkPayload) -> Result<()> {
        self.ok = Some(ok);
        Ok(())
    }

    fn resultset_start(&mut self, _columns: &[Column]) -> Result<()> {
        Ok(())
    }

    fn row(&mut self, _columns: &[Column], _row: crate::row::BinaryRowPayload<'_>) -> Result<()> {
        Ok(())
    }

    fn resultset_end(&mut self, ok: OkPayload) -> Result<()> {
        self.ok = Some(ok);
        Ok(())
    }
}

use crate::constant::CapabilityFlags;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;

/// Initial handshake packet from server (Protocol::HandshakeV10)
#[derive(Debug, Clone)]
pub struct InitialHandshake {
    pub protocol_version: u8,
    pub server_version: String,
    pub connection_id: u32,
    pub auth_plugin_data: Vec<u8>,
    pub capability_flags: CapabilityFlags,
    pub charset: u8,
    pub status_flags: u16,
    pub auth_plugin_name: String,
}

/// Read the server greeting. The caller has already dispatched on the
/// first payload byte being 10.
pub fn read_initial_handshake(payload: &[u8]) -> Result<InitialHandshake> {
    let (protocol_version, data) = read_int_1(payload)?;
    if protocol_version != 10 {
        return Err(Error::UnsupportedProtocol);
    }

    let (server_version_bytes, data) = read_string_null(data)?;
    let server_version = String::from_utf8_lossy(server_version_bytes).to_string();

    let (connection_id, data) = read_int_4(data)?;

    // auth-plugin-data-part-1 (8 bytes)
    let (auth_data_1, data) = read_string_fix(data, 8)?;

    // filler (1 byte)
    let (_filler, data) = read_int_1(data)?;

    // capability flags (lower 2 bytes)
    let (cap_lower, data) = read_int_2(data)?;

    let (charset, data) = read_int_1(data)?;
    let (status_flags, data) = read_int_2(data)?;

    // capability flags (upper 2 bytes)
    let (cap_upper, data) = read_int_2(data)?;

    let capability_flags =
        CapabilityFlags::from_bits_retain(((cap_upper as u32) << 16) | (cap_lower as u32));

    // total auth plugin data length (1 byte)
    let (auth_data_len, data) = read_int_1(data)?;

    // reserved (10 bytes)
    let (_reserved, data) = read_string_fix(data, 10)?;

    // auth-plugin-data-part-2: at least 13 bytes on servers that speak
    // CLIENT_PLUGIN_AUTH, usually 12 scramble bytes plus a trailing NUL
    let auth_data_2_len = if auth_data_len > 0 {
        (auth_data_len as usize).saturating_sub(8).max(13)
    } else {
        13
    };
    let (auth_data_2, data) = read_string_fix(data, auth_data_2_len)?;

    let mut auth_plugin_data = Vec::with_capacity(auth_data_1.len() + auth_data_2.len());
    auth_plugin_data.extend_from_slice(auth_data_1);
    auth_plugin_data.extend_from_slice(auth_data_2);
    if let Some(&0) = auth_plugin_data.last() {
        auth_plugin_data.pop();
    }

    let auth_plugin_name = if capability_flags.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH)
        && !data.is_empty()
    {
        let (name_bytes, _rest) = read_string_null(data)?;
        String::from_utf8_lossy(name_bytes).to_string()
    } else {
        String::new()
    };

    Ok(InitialHandshake {
        protocol_version,
        server_version,
        connection_id,
        auth_plugin_data,
        capability_flags,
        charset,
        status_flags,
        auth_plugin_name,
    })
}

/// Client handshake response (HandshakeResponse41)
#[derive(Debug, Clone)]
pub struct HandshakeResponse41<'a> {
    pub capability_flags: CapabilityFlags,
    pub max_packet_size: u32,
    pub charset: u8,
    pub username: &'a str,
    pub auth_response: &'a [u8],
    pub database: Option<&'a str>,
    pub auth_plugin_name: Option<&'a str>,
}

pub fn write_handshake_response(out: &mut Vec<u8>, response: &HandshakeResponse41<'_>) {
    let caps = response.capability_flags;

    write_int_4(out, caps.bits());
    write_int_4(out, response.max_packet_size);
    write_int_1(out, response.charset);

    // reserved (23 bytes of 0x00)
    out.extend_from_slice(&[0u8; 23]);

    write_string_null(out, response.username);

    if caps.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA) {
        write_bytes_lenenc(out, response.auth_response);
    } else {
        // CLIENT_SECURE_CONNECTION form: 1-byte length prefix
        write_int_1(out, response.auth_response.len() as u8);
        write_bytes_fix(out, response.auth_response);
    }

    if caps.contains(CapabilityFlags::CLIENT_CONNECT_WITH_DB) {
        write_string_null(out, response.database.unwrap_or(""));
    }

    if caps.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH) {
        write_string_null(out, response.auth_plugin_name.unwrap_or(""));
    }
}

/// Auth switch request from server (0xfe during the connection phase)
#[derive(Debug, Clone)]
pub struct AuthSwitchRequest {
    pub plugin_name: String,
    pub plugin_data: Vec<u8>,
}

pub fn read_auth_switch_request(payload: &[u8]) -> Result<AuthSwitchRequest> {
    let (header, data) = read_int_1(payload)?;
    if header != 0xfe {
        return Err(Error::UnexpectedPacket {
            first_byte: header,
            phase: "reading auth switch request",
        });
    }

    let (plugin_name_bytes, data) = read_string_null(data)?;
    let plugin_name = String::from_utf8_lossy(plugin_name_bytes).to_string();

    let mut plugin_data = data.to_vec();
    if let Some(&0) = plugin_data.last() {
        plugin_data.pop();
    }

    Ok(AuthSwitchRequest {
        plugin_name,
        plugin_data,
    })
}

/// Extra auth data from server (0x01 during the connection phase).
/// Returns the payload tail.
pub fn read_auth_more_data(payload: &[u8]) -> Result<&[u8]> {
    let (header, data) = read_int_1(payload)?;
    if header != 0x01 {
        return Err(Error::UnexpectedPacket {
            first_byte: header,
            phase: "reading auth more data",
        });
    }
    Ok(data)
}

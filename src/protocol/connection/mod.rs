pub mod auth;
mod handshake;

pub use handshake::read_auth_more_data;
pub use handshake::read_auth_switch_request;
pub use handshake::read_initial_handshake;
pub use handshake::write_handshake_response;
pub use handshake::AuthSwitchRequest;
pub use handshake::HandshakeResponse41;
pub use handshake::InitialHandshake;

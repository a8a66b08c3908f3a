//! Application payload family
//!
//! Typed request/reply/push messages keyed by a 16-bit payload type.
//! Requests end with a 32-bit ticket id that is echoed in every correlated
//! reply; unsolicited pushes carry ticket 0 or no ticket at all.

use crate::proto::wire::{DecodeError, PayloadReader, PayloadWriter, PAYLOAD_MAGIC};

/// Numeric payload types of the application family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PayloadKind {
    VersionCheck = 1,
    ChatPayload = 2,
    Login = 3,
    RequestLogin = 4,
    RegisterUser = 5,
    LoginUser = 6,
    LoginServer = 7,
    LoginReply = 8,
    LoginReplyCipher = 9,
    RegisterNickname = 21,
    ConfirmNickname = 22,
    SelectNickname = 23,
    SelectNicknameReply = 24,
    GetUserInfo = 25,
    SendUserInfo = 26,
    GetPlayerInfo = 27,
    SendPlayerInfo = 28,
    GetCdKeys = 29,
    SendCdKey = 30,
    GetChatServer = 31,
    SendChatServerInfo = 32,
    ResultStatus = 42,
    RequestCreateAccount = 71,
    RequestMotd = 105,
    SendMotd = 106,
    RegObserverGlobalChat = 107,
    DeregObserverGlobalChat = 108,
    UserLoggedIn = 109,
    RegObserverUserLogin = 115,
    DeregObserverUserLogin = 116,
    StatusWithId = 153,
    Chat = 165,
    RegisterServer = 168,
    UnlistServer = 169,
    GameServerData = 170,
    GetServers = 171,
    StopServerUpdates = 172,
    ConnectToServer = 173,
    ConnectToServerReply = 174,
    JoinServer = 175,
    LeaveServer = 176,
    UpdateServerInfo = 177,
    PlayerJoinedServer = 178,
    PlayerLeftServer = 179,
    PlayerConnecting = 180,
}

impl PayloadKind {
    pub fn from_u16(value: u16) -> Option<Self> {
        use PayloadKind::*;
        Some(match value {
            1 => VersionCheck,
            2 => ChatPayload,
            3 => Login,
            4 => RequestLogin,
            5 => RegisterUser,
            6 => LoginUser,
            7 => LoginServer,
            8 => LoginReply,
            9 => LoginReplyCipher,
            21 => RegisterNickname,
            22 => ConfirmNickname,
            23 => SelectNickname,
            24 => SelectNicknameReply,
            25 => GetUserInfo,
            26 => SendUserInfo,
            27 => GetPlayerInfo,
            28 => SendPlayerInfo,
            29 => GetCdKeys,
            30 => SendCdKey,
            31 => GetChatServer,
            32 => SendChatServerInfo,
            42 => ResultStatus,
            71 => RequestCreateAccount,
            105 => RequestMotd,
            106 => SendMotd,
            107 => RegObserverGlobalChat,
            108 => DeregObserverGlobalChat,
            109 => UserLoggedIn,
            115 => RegObserverUserLogin,
            116 => DeregObserverUserLogin,
            153 => StatusWithId,
            165 => Chat,
            168 => RegisterServer,
            169 => UnlistServer,
            170 => GameServerData,
            171 => GetServers,
            172 => StopServerUpdates,
            173 => ConnectToServer,
            174 => ConnectToServerReply,
            175 => JoinServer,
            176 => LeaveServer,
            177 => UpdateServerInfo,
            178 => PlayerJoinedServer,
            179 => PlayerLeftServer,
            180 => PlayerConnecting,
            _ => return None,
        })
    }
}

/// A typed message of the application family.
pub trait AppPayload: Sized {
    const KIND: PayloadKind;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError>;
    fn write_fields(&self, w: &mut PayloadWriter);
}

/// Serialize a payload, prefix included.
pub fn encode<P: AppPayload>(payload: &P) -> Vec<u8> {
    let mut w = PayloadWriter::new();
    w.write_prefix(PAYLOAD_MAGIC, P::KIND as u16);
    payload.write_fields(&mut w);
    w.into_bytes()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCheck {
    pub version: u32,
    pub ticket: u32,
}

impl AppPayload for VersionCheck {
    const KIND: PayloadKind = PayloadKind::VersionCheck;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            version: r.read_u32()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.version);
        w.write_u32(self.ticket);
    }
}

/// Global chat request from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPayload {
    pub mode: u32,
    pub text: String,
    pub ticket: u32,
}

impl AppPayload for ChatPayload {
    const KIND: PayloadKind = PayloadKind::ChatPayload;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            mode: r.read_u32()?,
            text: r.read_str()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.mode);
        w.write_str(&self.text);
        w.write_u32(self.ticket);
    }
}

/// Handshake opener carrying the client's key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub key: Vec<u8>,
    pub ticket: u32,
}

impl AppPayload for Login {
    const KIND: PayloadKind = PayloadKind::Login;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            key: r.read_blob()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_blob(&self.key);
        w.write_u32(self.ticket);
    }
}

/// Legacy plaintext login, bypassing the key exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLogin {
    pub nickname: String,
    pub password: String,
    pub cd_key: Vec<u8>,
    pub key_pool: u16,
    pub patch_level: u32,
    pub ticket: u32,
}

impl AppPayload for RequestLogin {
    const KIND: PayloadKind = PayloadKind::RequestLogin;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            nickname: r.read_str()?,
            password: r.read_str()?,
            cd_key: r.read_blob()?,
            key_pool: r.read_u16()?,
            patch_level: r.read_u32()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_str(&self.nickname);
        w.write_str(&self.password);
        w.write_blob(&self.cd_key);
        w.write_u16(self.key_pool);
        w.write_u32(self.patch_level);
        w.write_u32(self.ticket);
    }
}

/// Legacy plaintext account registration; same shape as [`RequestLogin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCreateAccount {
    pub nickname: String,
    pub password: String,
    pub cd_key: Vec<u8>,
    pub key_pool: u16,
    pub patch_level: u32,
    pub ticket: u32,
}

impl AppPayload for RequestCreateAccount {
    const KIND: PayloadKind = PayloadKind::RequestCreateAccount;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            nickname: r.read_str()?,
            password: r.read_str()?,
            cd_key: r.read_blob()?,
            key_pool: r.read_u16()?,
            patch_level: r.read_u32()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_str(&self.nickname);
        w.write_str(&self.password);
        w.write_blob(&self.cd_key);
        w.write_u16(self.key_pool);
        w.write_u32(self.patch_level);
        w.write_u32(self.ticket);
    }
}

macro_rules! cipher_payload {
    ($name:ident, $kind:ident) => {
        /// Cipher-wrapped credential submission.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub cipher: Vec<u8>,
            pub ticket: u32,
        }

        impl AppPayload for $name {
            const KIND: PayloadKind = PayloadKind::$kind;

            fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
                Ok(Self {
                    cipher: r.read_blob()?,
                    ticket: r.read_u32()?,
                })
            }

            fn write_fields(&self, w: &mut PayloadWriter) {
                w.write_blob(&self.cipher);
                w.write_u32(self.ticket);
            }
        }
    };
}

cipher_payload!(RegisterUser, RegisterUser);
cipher_payload!(LoginUser, LoginUser);
cipher_payload!(LoginServer, LoginServer);

/// Handshake reply: the shared secret wrapped under the client's key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReply {
    pub cipher: Vec<u8>,
    pub ticket: u32,
}

impl AppPayload for LoginReply {
    const KIND: PayloadKind = PayloadKind::LoginReply;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            cipher: r.read_blob()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_blob(&self.cipher);
        w.write_u32(self.ticket);
    }
}

/// Authentication success: account id plus the session key cipher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReplyCipher {
    pub perm_id: u32,
    pub cipher: Vec<u8>,
    pub ticket: u32,
}

impl AppPayload for LoginReplyCipher {
    const KIND: PayloadKind = PayloadKind::LoginReplyCipher;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            perm_id: r.read_u32()?,
            cipher: r.read_blob()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.perm_id);
        w.write_blob(&self.cipher);
        w.write_u32(self.ticket);
    }
}

/// Generic status reply. Error code 0 means success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStatus {
    pub error_code: u8,
    pub error_msg: String,
    pub ticket: u32,
}

impl ResultStatus {
    pub fn ok(ticket: u32) -> Self {
        Self {
            error_code: 0,
            error_msg: String::new(),
            ticket,
        }
    }

    pub fn fail(error_code: u8, error_msg: &str, ticket: u32) -> Self {
        Self {
            error_code,
            error_msg: error_msg.to_string(),
            ticket,
        }
    }
}

impl AppPayload for ResultStatus {
    const KIND: PayloadKind = PayloadKind::ResultStatus;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            error_code: r.read_u8()?,
            error_msg: r.read_str()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u8(self.error_code);
        w.write_str(&self.error_msg);
        w.write_u32(self.ticket);
    }
}

/// Status reply carrying an entity id (account or server).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusWithId {
    pub error_code: u8,
    pub error_msg: String,
    pub id: u32,
    pub ticket: u32,
}

impl StatusWithId {
    pub fn ok(id: u32, ticket: u32) -> Self {
        Self {
            error_code: 0,
            error_msg: String::new(),
            id,
            ticket,
        }
    }

    pub fn fail(error_code: u8, error_msg: &str, id: u32, ticket: u32) -> Self {
        Self {
            error_code,
            error_msg: error_msg.to_string(),
            id,
            ticket,
        }
    }
}

impl AppPayload for StatusWithId {
    const KIND: PayloadKind = PayloadKind::StatusWithId;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            error_code: r.read_u8()?,
            error_msg: r.read_str()?,
            id: r.read_u32()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u8(self.error_code);
        w.write_str(&self.error_msg);
        w.write_u32(self.id);
        w.write_u32(self.ticket);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterNickname {
    pub owner_id: u32,
    pub name: String,
    pub ticket: u32,
}

impl AppPayload for RegisterNickname {
    const KIND: PayloadKind = PayloadKind::RegisterNickname;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            owner_id: r.read_u32()?,
            name: r.read_str()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.owner_id);
        w.write_str(&self.name);
        w.write_u32(self.ticket);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmNickname {
    pub user_id: u32,
    pub mail: String,
    pub data: Vec<u8>,
    pub ticket: u32,
}

impl AppPayload for ConfirmNickname {
    const KIND: PayloadKind = PayloadKind::ConfirmNickname;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            user_id: r.read_u32()?,
            mail: r.read_str()?,
            data: r.read_blob()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.user_id);
        w.write_str(&self.mail);
        w.write_blob(&self.data);
        w.write_u32(self.ticket);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectNickname {
    pub char_id: u32,
    pub ticket: u32,
}

impl AppPayload for SelectNickname {
    const KIND: PayloadKind = PayloadKind::SelectNickname;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            char_id: r.read_u32()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.char_id);
        w.write_u32(self.ticket);
    }
}

/// Player profile record shared by [`SelectNicknameReply`] and
/// [`SendPlayerInfo`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerProfile {
    pub char_id: u32,
    pub name: String,
    pub owner_id: u32,
    pub owner_name: String,
    pub guild_id: u32,
    pub guild_name: String,
    pub guild_role: u8,
    pub status: u8,
    pub server_id: u32,
    pub server_name: String,
    pub data: Vec<u8>,
}

impl PlayerProfile {
    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            char_id: r.read_u32()?,
            name: r.read_str()?,
            owner_id: r.read_u32()?,
            owner_name: r.read_str()?,
            guild_id: r.read_u32()?,
            guild_name: r.read_str()?,
            guild_role: r.read_u8()?,
            status: r.read_u8()?,
            server_id: r.read_u32()?,
            server_name: r.read_str()?,
            data: r.read_blob()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.char_id);
        w.write_str(&self.name);
        w.write_u32(self.owner_id);
        w.write_str(&self.owner_name);
        w.write_u32(self.guild_id);
        w.write_str(&self.guild_name);
        w.write_u8(self.guild_role);
        w.write_u8(self.status);
        w.write_u32(self.server_id);
        w.write_str(&self.server_name);
        w.write_blob(&self.data);
    }
}

macro_rules! profile_payload {
    ($name:ident, $kind:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub profile: PlayerProfile,
            pub ticket: u32,
        }

        impl AppPayload for $name {
            const KIND: PayloadKind = PayloadKind::$kind;

            fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
                Ok(Self {
                    profile: PlayerProfile::read_fields(r)?,
                    ticket: r.read_u32()?,
                })
            }

            fn write_fields(&self, w: &mut PayloadWriter) {
                self.profile.write_fields(w);
                w.write_u32(self.ticket);
            }
        }
    };
}

profile_payload!(SelectNicknameReply, SelectNicknameReply);
profile_payload!(SendPlayerInfo, SendPlayerInfo);

macro_rules! user_id_request {
    ($name:ident, $kind:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub user_id: u32,
            pub ticket: u32,
        }

        impl AppPayload for $name {
            const KIND: PayloadKind = PayloadKind::$kind;

            fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
                Ok(Self {
                    user_id: r.read_u32()?,
                    ticket: r.read_u32()?,
                })
            }

            fn write_fields(&self, w: &mut PayloadWriter) {
                w.write_u32(self.user_id);
                w.write_u32(self.ticket);
            }
        }
    };
}

user_id_request!(GetUserInfo, GetUserInfo);
user_id_request!(GetPlayerInfo, GetPlayerInfo);
user_id_request!(GetCdKeys, GetCdKeys);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendUserInfo {
    pub user_id: u32,
    pub name: String,
    pub password: String,
    pub mail: String,
    pub banned: bool,
    pub active: bool,
    pub status: u8,
    pub data: Vec<u8>,
    pub created: String,
    pub last_login: String,
    pub total_logins: u32,
    pub ticket: u32,
}

impl AppPayload for SendUserInfo {
    const KIND: PayloadKind = PayloadKind::SendUserInfo;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            user_id: r.read_u32()?,
            name: r.read_str()?,
            password: r.read_str()?,
            mail: r.read_str()?,
            banned: r.read_bool()?,
            active: r.read_bool()?,
            status: r.read_u8()?,
            data: r.read_blob()?,
            created: r.read_str()?,
            last_login: r.read_str()?,
            total_logins: r.read_u32()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.user_id);
        w.write_str(&self.name);
        w.write_str(&self.password);
        w.write_str(&self.mail);
        w.write_bool(self.banned);
        w.write_bool(self.active);
        w.write_u8(self.status);
        w.write_blob(&self.data);
        w.write_str(&self.created);
        w.write_str(&self.last_login);
        w.write_u32(self.total_logins);
        w.write_u32(self.ticket);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendCdKey {
    pub user_id: u32,
    pub cd_key: String,
    pub key_pool: u16,
    pub ticket: u32,
}

impl AppPayload for SendCdKey {
    const KIND: PayloadKind = PayloadKind::SendCdKey;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            user_id: r.read_u32()?,
            cd_key: r.read_str()?,
            key_pool: r.read_u16()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.user_id);
        w.write_str(&self.cd_key);
        w.write_u16(self.key_pool);
        w.write_u32(self.ticket);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetChatServer {
    pub server_type: u8,
    pub ticket: u32,
}

impl AppPayload for GetChatServer {
    const KIND: PayloadKind = PayloadKind::GetChatServer;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            server_type: r.read_u8()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u8(self.server_type);
        w.write_u32(self.ticket);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendChatServerInfo {
    pub server_id: u32,
    pub ip: String,
    pub port: u32,
    pub server_type: u8,
    pub version: String,
    pub data: Vec<u8>,
    pub ticket: u32,
}

impl AppPayload for SendChatServerInfo {
    const KIND: PayloadKind = PayloadKind::SendChatServerInfo;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            server_id: r.read_u32()?,
            ip: r.read_str()?,
            port: r.read_u32()?,
            server_type: r.read_u8()?,
            version: r.read_str()?,
            data: r.read_blob()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.server_id);
        w.write_str(&self.ip);
        w.write_u32(self.port);
        w.write_u8(self.server_type);
        w.write_str(&self.version);
        w.write_blob(&self.data);
        w.write_u32(self.ticket);
    }
}

macro_rules! ticket_only_payload {
    ($name:ident, $kind:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub ticket: u32,
        }

        impl AppPayload for $name {
            const KIND: PayloadKind = PayloadKind::$kind;

            fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
                Ok(Self {
                    ticket: r.read_u32()?,
                })
            }

            fn write_fields(&self, w: &mut PayloadWriter) {
                w.write_u32(self.ticket);
            }
        }
    };
}

ticket_only_payload!(RequestMotd, RequestMotd);
ticket_only_payload!(RegObserverGlobalChat, RegObserverGlobalChat);
ticket_only_payload!(DeregObserverGlobalChat, DeregObserverGlobalChat);
ticket_only_payload!(DeregObserverUserLogin, DeregObserverUserLogin);
ticket_only_payload!(StopServerUpdates, StopServerUpdates);

/// Message of the day. The body is UTF-8 on the wire (unlike the ASCII
/// strings everywhere else), so it travels as a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMotd {
    pub text: Vec<u8>,
    pub ticket: u32,
}

impl AppPayload for SendMotd {
    const KIND: PayloadKind = PayloadKind::SendMotd;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            text: r.read_blob()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_blob(&self.text);
        w.write_u32(self.ticket);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegObserverUserLogin {
    pub send_all: bool,
    pub ticket: u32,
}

impl AppPayload for RegObserverUserLogin {
    const KIND: PayloadKind = PayloadKind::RegObserverUserLogin;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            send_all: r.read_bool()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_bool(self.send_all);
        w.write_u32(self.ticket);
    }
}

/// Push sent to login observers when an account comes online.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLoggedIn {
    pub user_id: u32,
    pub name: String,
}

impl AppPayload for UserLoggedIn {
    const KIND: PayloadKind = PayloadKind::UserLoggedIn;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            user_id: r.read_u32()?,
            name: r.read_str()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.user_id);
        w.write_str(&self.name);
    }
}

/// Push fanned out to chat observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub text: String,
    pub from_id: u32,
}

impl AppPayload for Chat {
    const KIND: PayloadKind = PayloadKind::Chat;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            text: r.read_str()?,
            from_id: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_str(&self.text);
        w.write_u32(self.from_id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterServer {
    pub name: String,
    pub description: String,
    pub port: u32,
    pub server_type: u8,
    pub lobby_id: u32,
    pub version: String,
    pub players_total: u8,
    pub players_ai: u8,
    pub level: u8,
    pub game_mode: u8,
    pub hardcore: bool,
    pub map: String,
    pub automatic_join: bool,
    pub data: Vec<u8>,
    pub ticket: u32,
}

impl AppPayload for RegisterServer {
    const KIND: PayloadKind = PayloadKind::RegisterServer;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            name: r.read_str()?,
            description: r.read_str()?,
            port: r.read_u32()?,
            server_type: r.read_u8()?,
            lobby_id: r.read_u32()?,
            version: r.read_str()?,
            players_total: r.read_u8()?,
            players_ai: r.read_u8()?,
            level: r.read_u8()?,
            game_mode: r.read_u8()?,
            hardcore: r.read_bool()?,
            map: r.read_str()?,
            automatic_join: r.read_bool()?,
            data: r.read_blob()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_str(&self.name);
        w.write_str(&self.description);
        w.write_u32(self.port);
        w.write_u8(self.server_type);
        w.write_u32(self.lobby_id);
        w.write_str(&self.version);
        w.write_u8(self.players_total);
        w.write_u8(self.players_ai);
        w.write_u8(self.level);
        w.write_u8(self.game_mode);
        w.write_bool(self.hardcore);
        w.write_str(&self.map);
        w.write_bool(self.automatic_join);
        w.write_blob(&self.data);
        w.write_u32(self.ticket);
    }
}

/// Unlist request and removal push.
///
/// The ticket doubles as an opcode: 11 removes the server, 14 marks it
/// running and notifies the players in it. This is how the wire protocol
/// works; do not clean it up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlistServer {
    pub server_id: u32,
    pub running: bool,
    pub ticket: u32,
}

impl AppPayload for UnlistServer {
    const KIND: PayloadKind = PayloadKind::UnlistServer;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            server_id: r.read_u32()?,
            running: r.read_bool()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.server_id);
        w.write_bool(self.running);
        w.write_u32(self.ticket);
    }
}

/// Point-in-time snapshot of one registered game server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameServerData {
    pub server_id: u32,
    pub name: String,
    pub owner_id: u32,
    pub description: String,
    pub ip: String,
    pub port: u32,
    pub server_type: u8,
    pub lobby_id: u32,
    pub version: String,
    pub players_max: u8,
    pub players_curr: u8,
    pub players_ai: u8,
    pub level: u8,
    pub game_mode: u8,
    pub hardcore: bool,
    pub map: String,
    pub running: bool,
    pub data: Vec<u8>,
    pub ticket: u32,
}

impl AppPayload for GameServerData {
    const KIND: PayloadKind = PayloadKind::GameServerData;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            server_id: r.read_u32()?,
            name: r.read_str()?,
            owner_id: r.read_u32()?,
            description: r.read_str()?,
            ip: r.read_str()?,
            port: r.read_u32()?,
            server_type: r.read_u8()?,
            lobby_id: r.read_u32()?,
            version: r.read_str()?,
            players_max: r.read_u8()?,
            players_curr: r.read_u8()?,
            players_ai: r.read_u8()?,
            level: r.read_u8()?,
            game_mode: r.read_u8()?,
            hardcore: r.read_bool()?,
            map: r.read_str()?,
            running: r.read_bool()?,
            data: r.read_blob()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.server_id);
        w.write_str(&self.name);
        w.write_u32(self.owner_id);
        w.write_str(&self.description);
        w.write_str(&self.ip);
        w.write_u32(self.port);
        w.write_u8(self.server_type);
        w.write_u32(self.lobby_id);
        w.write_str(&self.version);
        w.write_u8(self.players_max);
        w.write_u8(self.players_curr);
        w.write_u8(self.players_ai);
        w.write_u8(self.level);
        w.write_u8(self.game_mode);
        w.write_bool(self.hardcore);
        w.write_str(&self.map);
        w.write_bool(self.running);
        w.write_blob(&self.data);
        w.write_u32(self.ticket);
    }
}

/// Server-list request; also subscribes the caller to update broadcasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetServers {
    pub send_all: bool,
    pub server_type: u8,
    pub room_id: u32,
    pub selection: u32,
    pub ticket: u32,
}

impl AppPayload for GetServers {
    const KIND: PayloadKind = PayloadKind::GetServers;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            send_all: r.read_bool()?,
            server_type: r.read_u8()?,
            room_id: r.read_u32()?,
            selection: r.read_u32()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_bool(self.send_all);
        w.write_u8(self.server_type);
        w.write_u32(self.room_id);
        w.write_u32(self.selection);
        w.write_u32(self.ticket);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectToServer {
    pub server_id: u32,
    pub ticket: u32,
}

impl AppPayload for ConnectToServer {
    const KIND: PayloadKind = PayloadKind::ConnectToServer;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            server_id: r.read_u32()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.server_id);
        w.write_u32(self.ticket);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectToServerReply {
    pub perm_id: u32,
    pub server_id: u32,
    pub ip: String,
    pub port: u32,
    pub nonce: Vec<u8>,
    pub error_code: u8,
    pub error_msg: String,
    pub ticket: u32,
}

impl AppPayload for ConnectToServerReply {
    const KIND: PayloadKind = PayloadKind::ConnectToServerReply;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            perm_id: r.read_u32()?,
            server_id: r.read_u32()?,
            ip: r.read_str()?,
            port: r.read_u32()?,
            nonce: r.read_blob()?,
            error_code: r.read_u8()?,
            error_msg: r.read_str()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.perm_id);
        w.write_u32(self.server_id);
        w.write_str(&self.ip);
        w.write_u32(self.port);
        w.write_blob(&self.nonce);
        w.write_u8(self.error_code);
        w.write_str(&self.error_msg);
        w.write_u32(self.ticket);
    }
}

/// Join request. The user id field is 0 in practice; the session account is
/// used when it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinServer {
    pub user_id: u32,
    pub server_id: u32,
    pub ticket: u32,
}

impl AppPayload for JoinServer {
    const KIND: PayloadKind = PayloadKind::JoinServer;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            user_id: r.read_u32()?,
            server_id: r.read_u32()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.user_id);
        w.write_u32(self.server_id);
        w.write_u32(self.ticket);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveServer {
    pub user_id: u32,
    pub ticket: u32,
}

impl AppPayload for LeaveServer {
    const KIND: PayloadKind = PayloadKind::LeaveServer;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            user_id: r.read_u32()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.user_id);
        w.write_u32(self.ticket);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateServerInfo {
    pub server_id: u32,
    pub name: String,
    pub description: String,
    pub players_max: u8,
    pub slots_occupied: u8,
    pub level: u8,
    pub game_mode: u8,
    pub hardcore: bool,
    pub map: String,
    pub running: bool,
    pub data: Vec<u8>,
    pub property_mask: u32,
    pub ticket: u32,
}

impl AppPayload for UpdateServerInfo {
    const KIND: PayloadKind = PayloadKind::UpdateServerInfo;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            server_id: r.read_u32()?,
            name: r.read_str()?,
            description: r.read_str()?,
            players_max: r.read_u8()?,
            slots_occupied: r.read_u8()?,
            level: r.read_u8()?,
            game_mode: r.read_u8()?,
            hardcore: r.read_bool()?,
            map: r.read_str()?,
            running: r.read_bool()?,
            data: r.read_blob()?,
            property_mask: r.read_u32()?,
            ticket: r.read_u32()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_u32(self.server_id);
        w.write_str(&self.name);
        w.write_str(&self.description);
        w.write_u8(self.players_max);
        w.write_u8(self.slots_occupied);
        w.write_u8(self.level);
        w.write_u8(self.game_mode);
        w.write_bool(self.hardcore);
        w.write_str(&self.map);
        w.write_bool(self.running);
        w.write_blob(&self.data);
        w.write_u32(self.property_mask);
        w.write_u32(self.ticket);
    }
}

macro_rules! perm_id_payload {
    ($name:ident, $kind:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub perm_id: u32,
            pub ticket: u32,
        }

        impl AppPayload for $name {
            const KIND: PayloadKind = PayloadKind::$kind;

            fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
                Ok(Self {
                    perm_id: r.read_u32()?,
                    ticket: r.read_u32()?,
                })
            }

            fn write_fields(&self, w: &mut PayloadWriter) {
                w.write_u32(self.perm_id);
                w.write_u32(self.ticket);
            }
        }
    };
}

perm_id_payload!(PlayerJoinedServer, PlayerJoinedServer);
perm_id_payload!(PlayerLeftServer, PlayerLeftServer);

/// Push sent to a hosting connection when a player is about to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConnecting {
    pub nonce: Vec<u8>,
    pub char_id: u32,
    pub name: String,
    pub owner_id: u32,
    pub owner_name: String,
    pub guild_id: u32,
    pub guild_name: String,
    pub guild_role: u8,
    pub data: Vec<u8>,
}

impl AppPayload for PlayerConnecting {
    const KIND: PayloadKind = PayloadKind::PlayerConnecting;

    fn read_fields(r: &mut PayloadReader) -> Result<Self, DecodeError> {
        Ok(Self {
            nonce: r.read_blob()?,
            char_id: r.read_u32()?,
            name: r.read_str()?,
            owner_id: r.read_u32()?,
            owner_name: r.read_str()?,
            guild_id: r.read_u32()?,
            guild_name: r.read_str()?,
            guild_role: r.read_u8()?,
            data: r.read_blob()?,
        })
    }

    fn write_fields(&self, w: &mut PayloadWriter) {
        w.write_blob(&self.nonce);
        w.write_u32(self.char_id);
        w.write_str(&self.name);
        w.write_u32(self.owner_id);
        w.write_str(&self.owner_name);
        w.write_u32(self.guild_id);
        w.write_str(&self.guild_name);
        w.write_u8(self.guild_role);
        w.write_blob(&self.data);
    }
}

/// A fully decoded application payload, ready for dispatch.
#[derive(Debug, Clone)]
pub enum AppMessage {
    VersionCheck(VersionCheck),
    ChatPayload(ChatPayload),
    Login(Login),
    RequestLogin(RequestLogin),
    RegisterUser(RegisterUser),
    LoginUser(LoginUser),
    LoginServer(LoginServer),
    LoginReply(LoginReply),
    LoginReplyCipher(LoginReplyCipher),
    RegisterNickname(RegisterNickname),
    ConfirmNickname(ConfirmNickname),
    SelectNickname(SelectNickname),
    SelectNicknameReply(SelectNicknameReply),
    GetUserInfo(GetUserInfo),
    SendUserInfo(SendUserInfo),
    GetPlayerInfo(GetPlayerInfo),
    SendPlayerInfo(SendPlayerInfo),
    GetCdKeys(GetCdKeys),
    SendCdKey(SendCdKey),
    GetChatServer(GetChatServer),
    SendChatServerInfo(SendChatServerInfo),
    ResultStatus(ResultStatus),
    RequestCreateAccount(RequestCreateAccount),
    RequestMotd(RequestMotd),
    SendMotd(SendMotd),
    RegObserverGlobalChat(RegObserverGlobalChat),
    DeregObserverGlobalChat(DeregObserverGlobalChat),
    UserLoggedIn(UserLoggedIn),
    RegObserverUserLogin(RegObserverUserLogin),
    DeregObserverUserLogin(DeregObserverUserLogin),
    StatusWithId(StatusWithId),
    Chat(Chat),
    RegisterServer(RegisterServer),
    UnlistServer(UnlistServer),
    GameServerData(GameServerData),
    GetServers(GetServers),
    StopServerUpdates(StopServerUpdates),
    ConnectToServer(ConnectToServer),
    ConnectToServerReply(ConnectToServerReply),
    JoinServer(JoinServer),
    LeaveServer(LeaveServer),
    UpdateServerInfo(UpdateServerInfo),
    PlayerJoinedServer(PlayerJoinedServer),
    PlayerLeftServer(PlayerLeftServer),
    PlayerConnecting(PlayerConnecting),
}

impl AppMessage {
    /// Decode the payload body for a numeric type. `Ok(None)` means the
    /// type is not part of the catalogue; the caller logs and drops it.
    pub fn decode(kind: u16, r: &mut PayloadReader) -> Result<Option<Self>, DecodeError> {
        use PayloadKind as K;
        let Some(kind) = K::from_u16(kind) else {
            return Ok(None);
        };
        let msg = match kind {
            K::VersionCheck => Self::VersionCheck(VersionCheck::read_fields(r)?),
            K::ChatPayload => Self::ChatPayload(ChatPayload::read_fields(r)?),
            K::Login => Self::Login(Login::read_fields(r)?),
            K::RequestLogin => Self::RequestLogin(RequestLogin::read_fields(r)?),
            K::RegisterUser => Self::RegisterUser(RegisterUser::read_fields(r)?),
            K::LoginUser => Self::LoginUser(LoginUser::read_fields(r)?),
            K::LoginServer => Self::LoginServer(LoginServer::read_fields(r)?),
            K::LoginReply => Self::LoginReply(LoginReply::read_fields(r)?),
            K::LoginReplyCipher => Self::LoginReplyCipher(LoginReplyCipher::read_fields(r)?),
            K::RegisterNickname => Self::RegisterNickname(RegisterNickname::read_fields(r)?),
            K::ConfirmNickname => Self::ConfirmNickname(ConfirmNickname::read_fields(r)?),
            K::SelectNickname => Self::SelectNickname(SelectNickname::read_fields(r)?),
            K::SelectNicknameReply => {
                Self::SelectNicknameReply(SelectNicknameReply::read_fields(r)?)
            }
            K::GetUserInfo => Self::GetUserInfo(GetUserInfo::read_fields(r)?),
            K::SendUserInfo => Self::SendUserInfo(SendUserInfo::read_fields(r)?),
            K::GetPlayerInfo => Self::GetPlayerInfo(GetPlayerInfo::read_fields(r)?),
            K::SendPlayerInfo => Self::SendPlayerInfo(SendPlayerInfo::read_fields(r)?),
            K::GetCdKeys => Self::GetCdKeys(GetCdKeys::read_fields(r)?),
            K::SendCdKey => Self::SendCdKey(SendCdKey::read_fields(r)?),
            K::GetChatServer => Self::GetChatServer(GetChatServer::read_fields(r)?),
            K::SendChatServerInfo => Self::SendChatServerInfo(SendChatServerInfo::read_fields(r)?),
            K::ResultStatus => Self::ResultStatus(ResultStatus::read_fields(r)?),
            K::RequestCreateAccount => {
                Self::RequestCreateAccount(RequestCreateAccount::read_fields(r)?)
            }
            K::RequestMotd => Self::RequestMotd(RequestMotd::read_fields(r)?),
            K::SendMotd => Self::SendMotd(SendMotd::read_fields(r)?),
            K::RegObserverGlobalChat => {
                Self::RegObserverGlobalChat(RegObserverGlobalChat::read_fields(r)?)
            }
            K::DeregObserverGlobalChat => {
                Self::DeregObserverGlobalChat(DeregObserverGlobalChat::read_fields(r)?)
            }
            K::UserLoggedIn => Self::UserLoggedIn(UserLoggedIn::read_fields(r)?),
            K::RegObserverUserLogin => {
                Self::RegObserverUserLogin(RegObserverUserLogin::read_fields(r)?)
            }
            K::DeregObserverUserLogin => {
                Self::DeregObserverUserLogin(DeregObserverUserLogin::read_fields(r)?)
            }
            K::StatusWithId => Self::StatusWithId(StatusWithId::read_fields(r)?),
            K::Chat => Self::Chat(Chat::read_fields(r)?),
            K::RegisterServer => Self::RegisterServer(RegisterServer::read_fields(r)?),
            K::UnlistServer => Self::UnlistServer(UnlistServer::read_fields(r)?),
            K::GameServerData => Self::GameServerData(GameServerData::read_fields(r)?),
            K::GetServers => Self::GetServers(GetServers::read_fields(r)?),
            K::StopServerUpdates => Self::StopServerUpdates(StopServerUpdates::read_fields(r)?),
            K::ConnectToServer => Self::ConnectToServer(ConnectToServer::read_fields(r)?),
            K::ConnectToServerReply => {
                Self::ConnectToServerReply(ConnectToServerReply::read_fields(r)?)
            }
            K::JoinServer => Self::JoinServer(JoinServer::read_fields(r)?),
            K::LeaveServer => Self::LeaveServer(LeaveServer::read_fields(r)?),
            K::UpdateServerInfo => Self::UpdateServerInfo(UpdateServerInfo::read_fields(r)?),
            K::PlayerJoinedServer => Self::PlayerJoinedServer(PlayerJoinedServer::read_fields(r)?),
            K::PlayerLeftServer => Self::PlayerLeftServer(PlayerLeftServer::read_fields(r)?),
            K::PlayerConnecting => Self::PlayerConnecting(PlayerConnecting::read_fields(r)?),
        };
        Ok(Some(msg))
    }
}

//! Lobby handler table
//!
//! Everything past authentication: nicknames, account info, MOTD, chat,
//! the game server registry and its observer fanout. Consulted before the
//! base table.

use tracing::{debug, error, info};

use crate::accounts::Account;
use crate::handler::{HandlerContext, LobbyState};
use crate::proto::payloads::*;
use crate::registry::servers::{GameServer, JoinError, ServerId, UpdateError};
use crate::session::AuthStage;

/// Static cd-key pool handed out by GetCDKeys.
const CD_KEY_POOL: u16 = 1;
const CD_KEY_PLACEHOLDER: &str = "0000000000000000";

/// Unlist ticket values that double as opcodes on the wire.
const UNLIST_REMOVE: u32 = 11;
const UNLIST_START: u32 = 14;

/// Handle a lobby-table payload. Returns the message back when this table
/// has no handler for it.
pub fn handle(ctx: &mut HandlerContext, msg: AppMessage) -> Option<AppMessage> {
    match msg {
        AppMessage::RegisterNickname(msg) => register_nickname(ctx, msg),
        AppMessage::ConfirmNickname(msg) => confirm_nickname(ctx, msg),
        AppMessage::SelectNickname(msg) => select_nickname(ctx, msg),
        AppMessage::GetUserInfo(msg) => get_user_info(ctx, msg),
        AppMessage::GetPlayerInfo(msg) => get_player_info(ctx, msg),
        AppMessage::GetCdKeys(msg) => get_cd_keys(ctx, msg),
        AppMessage::RequestMotd(msg) => request_motd(ctx, msg),
        AppMessage::GetChatServer(msg) => get_chat_server(ctx, msg),
        AppMessage::RegObserverGlobalChat(msg) => reg_global_chat(ctx, msg),
        AppMessage::DeregObserverGlobalChat(msg) => dereg_global_chat(ctx, msg),
        AppMessage::RegObserverUserLogin(msg) => reg_user_login(ctx, msg),
        AppMessage::DeregObserverUserLogin(msg) => dereg_user_login(ctx, msg),
        AppMessage::ChatPayload(msg) => chat(ctx, msg),
        AppMessage::RegisterServer(msg) => register_server(ctx, msg),
        AppMessage::GetServers(msg) => get_servers(ctx, msg),
        AppMessage::StopServerUpdates(msg) => stop_server_updates(ctx, msg),
        AppMessage::JoinServer(msg) => join_server(ctx, msg),
        AppMessage::LeaveServer(msg) => leave_server(ctx, msg),
        AppMessage::UpdateServerInfo(msg) => update_server_info(ctx, msg),
        AppMessage::UnlistServer(msg) => unlist_server(ctx, msg),
        AppMessage::ConnectToServer(msg) => connect_to_server(ctx, msg),
        AppMessage::PlayerJoinedServer(msg) => player_joined_server(ctx, msg),
        AppMessage::PlayerLeftServer(msg) => player_left_server(ctx, msg),
        other => return Some(other),
    }
    None
}

/// Session account, or a "Not logged in" failure to the caller.
fn require_account(ctx: &mut HandlerContext, ticket: u32) -> Option<Account> {
    match &ctx.session.account {
        Some(account) => Some(account.clone()),
        None => {
            ctx.reply(&ResultStatus::fail(1, "Not logged in", ticket));
            None
        }
    }
}

fn server_info(server: &GameServer, ticket: u32) -> GameServerData {
    GameServerData {
        server_id: server.id,
        name: server.name.clone(),
        owner_id: server.owner_account,
        description: server.description.clone(),
        ip: server.ip.clone(),
        port: server.port,
        server_type: server.server_type,
        lobby_id: server.lobby_id,
        version: server.version.clone(),
        players_max: server.players_total,
        players_curr: server.players.len() as u8,
        players_ai: server.players_ai,
        level: server.level,
        game_mode: server.game_mode,
        hardcore: server.hardcore,
        map: server.map.clone(),
        running: server.running,
        data: server.data.clone(),
        ticket,
    }
}

/// Push the current snapshot of one server to every server-list observer.
fn broadcast_server_update(state: &LobbyState, server: &GameServer) {
    let payload = crate::proto::encode(&server_info(server, 0));
    for (conn, _) in state.server_updates.snapshot() {
        state.sink.send(conn, payload.clone());
    }
}

/// Push a removal notification to every server-list observer.
fn broadcast_server_removal(state: &LobbyState, server_id: ServerId, running: bool) {
    let payload = crate::proto::encode(&UnlistServer {
        server_id,
        running,
        ticket: 0,
    });
    for (conn, _) in state.server_updates.snapshot() {
        state.sink.send(conn, payload.clone());
    }
}

fn register_nickname(ctx: &mut HandlerContext, msg: RegisterNickname) {
    if msg.owner_id != 0 {
        ctx.reply(&StatusWithId::fail(1, "Incorrect account", msg.owner_id, msg.ticket));
        return;
    }
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    ctx.state.accounts.set_player_name(account.id, &msg.name);
    if let Some(session_account) = &mut ctx.session.account {
        session_account.player_name = msg.name.clone();
    }
    ctx.session.stage = AuthStage::NicknameSelected;
    ctx.reply(&StatusWithId::ok(account.id, msg.ticket));
}

fn confirm_nickname(ctx: &mut HandlerContext, msg: ConfirmNickname) {
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    if msg.user_id != account.id {
        ctx.reply(&ResultStatus::fail(1, "Incorrect account", msg.ticket));
        return;
    }
    ctx.state.accounts.set_email(account.id, &msg.mail);
    ctx.state.accounts.set_user_data(account.id, msg.data.clone());
    if let Some(session_account) = &mut ctx.session.account {
        session_account.email = msg.mail;
        session_account.user_data = msg.data;
    }
    ctx.session.stage = AuthStage::NicknameSelected;
    ctx.reply(&ResultStatus::ok(msg.ticket));
}

fn player_profile(account: &Account) -> PlayerProfile {
    PlayerProfile {
        char_id: account.id,
        name: account.player_name.clone(),
        owner_id: account.id,
        owner_name: account.user_name_stripped().to_string(),
        status: 1,
        data: account.user_data.clone(),
        ..PlayerProfile::default()
    }
}

fn select_nickname(ctx: &mut HandlerContext, msg: SelectNickname) {
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    debug!(conn = ctx.session.conn, char_id = msg.char_id, "nickname selected");
    ctx.session.stage = AuthStage::NicknameSelected;
    ctx.reply(&SelectNicknameReply {
        profile: player_profile(&account),
        ticket: msg.ticket,
    });
    ctx.reply(&ResultStatus::ok(msg.ticket));
}

fn get_user_info(ctx: &mut HandlerContext, msg: GetUserInfo) {
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    if msg.user_id != account.id {
        ctx.reply(&ResultStatus::fail(1, "Incorrect account", msg.ticket));
        return;
    }
    ctx.reply(&SendUserInfo {
        user_id: account.id,
        name: account.user_name.clone(),
        password: String::new(),
        mail: account.email.clone(),
        banned: false,
        active: true,
        status: 1,
        data: account.user_data.clone(),
        created: String::new(),
        last_login: String::new(),
        total_logins: 1,
        ticket: msg.ticket,
    });
    ctx.reply(&ResultStatus::ok(msg.ticket));
}

fn get_player_info(ctx: &mut HandlerContext, msg: GetPlayerInfo) {
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    if msg.user_id != account.id {
        ctx.reply(&ResultStatus::fail(1, "Incorrect account", msg.ticket));
        return;
    }
    ctx.reply(&SendPlayerInfo {
        profile: player_profile(&account),
        ticket: msg.ticket,
    });
    ctx.reply(&ResultStatus::ok(msg.ticket));
}

fn get_cd_keys(ctx: &mut HandlerContext, msg: GetCdKeys) {
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    if msg.user_id != account.id {
        ctx.reply(&ResultStatus::fail(1, "Incorrect account", msg.ticket));
        return;
    }
    ctx.reply(&SendCdKey {
        user_id: account.id,
        cd_key: CD_KEY_PLACEHOLDER.to_string(),
        key_pool: CD_KEY_POOL,
        ticket: msg.ticket,
    });
    ctx.reply(&ResultStatus::ok(msg.ticket));
}

fn request_motd(ctx: &mut HandlerContext, msg: RequestMotd) {
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    let text = ctx
        .state
        .config
        .motd
        .replace("%name%", account.user_name_stripped());
    ctx.reply(&SendMotd {
        text: text.into_bytes(),
        ticket: msg.ticket,
    });
}

fn get_chat_server(ctx: &mut HandlerContext, msg: GetChatServer) {
    let Some(_account) = require_account(ctx, msg.ticket) else {
        return;
    };
    ctx.reply(&SendChatServerInfo {
        server_id: 1,
        ip: ctx.state.config.chat_ip.clone(),
        port: ctx.state.config.chat_port,
        server_type: msg.server_type,
        version: String::new(),
        data: Vec::new(),
        ticket: msg.ticket,
    });
    ctx.reply(&ResultStatus::ok(msg.ticket));
}

fn reg_global_chat(ctx: &mut HandlerContext, msg: RegObserverGlobalChat) {
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    ctx.state.global_chat.subscribe(ctx.session.conn, account.id);
    ctx.reply(&ResultStatus::ok(msg.ticket));
}

fn dereg_global_chat(ctx: &mut HandlerContext, msg: DeregObserverGlobalChat) {
    ctx.state.global_chat.unsubscribe(ctx.session.conn);
    ctx.reply(&ResultStatus::ok(msg.ticket));
}

fn reg_user_login(ctx: &mut HandlerContext, msg: RegObserverUserLogin) {
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    if ctx.state.user_logins.subscribe(ctx.session.conn, account.id) {
        ctx.reply(&ResultStatus::ok(msg.ticket));
    } else {
        error!(conn = ctx.session.conn, "already observing user logins");
    }
    // New observers always get the current online snapshot.
    for user in ctx.state.online.snapshot() {
        ctx.reply(&UserLoggedIn {
            user_id: user.account_id,
            name: user.user_name,
        });
    }
}

fn dereg_user_login(ctx: &mut HandlerContext, msg: DeregObserverUserLogin) {
    ctx.state.user_logins.unsubscribe(ctx.session.conn);
    ctx.reply(&ResultStatus::ok(msg.ticket));
}

/// Fan a chat line out to the subscribed connections. There is no
/// correlated reply; an unsubscribed sender hears nothing back.
fn chat(ctx: &mut HandlerContext, msg: ChatPayload) {
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    let push = Chat {
        text: msg.text,
        from_id: account.id,
    };
    for (conn, _) in ctx.state.global_chat.snapshot() {
        ctx.push_to(conn, &push);
    }
}

fn register_server(ctx: &mut HandlerContext, msg: RegisterServer) {
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    let id = ctx.state.servers.register(&msg.name);
    if id == 0 {
        ctx.reply(&StatusWithId::fail(1, "Failed to register server", 0, msg.ticket));
        return;
    }
    let conn = ctx.session.conn;
    let server = ctx.state.servers.configure(id, |s| {
        s.owner_conn = conn;
        s.owner_account = account.id;
        s.ip = ctx.state.config.lobby_ip.clone();
        s.port = msg.port;
        s.description = msg.description.clone();
        s.server_type = msg.server_type;
        s.lobby_id = msg.lobby_id;
        s.version = msg.version.clone();
        s.players_total = msg.players_total;
        s.players_ai = msg.players_ai;
        s.level = msg.level;
        s.game_mode = msg.game_mode;
        s.hardcore = msg.hardcore;
        s.map = msg.map.clone();
        s.data = msg.data.clone();
        s.running = false;
        // The owner occupies the first slot.
        s.players.insert(account.id, conn);
    });
    let Some(server) = server else {
        ctx.reply(&StatusWithId::fail(1, "Failed to register server", 0, msg.ticket));
        return;
    };
    info!(
        conn,
        server_id = id,
        name = %server.name,
        capacity = server.players_total,
        "game server listed"
    );
    ctx.session.owned_server = Some(id);
    ctx.session.joined_server = Some(id);
    broadcast_server_update(ctx.state, &server);
    ctx.reply(&StatusWithId::ok(id, msg.ticket));
}

fn get_servers(ctx: &mut HandlerContext, msg: GetServers) {
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    if !ctx.state.server_updates.subscribe(ctx.session.conn, account.id) {
        ctx.reply(&ResultStatus::fail(3, "Can not get server list", msg.ticket));
        return;
    }
    for server in ctx.state.servers.servers() {
        ctx.reply(&server_info(&server, msg.ticket));
    }
    ctx.reply(&ResultStatus::ok(msg.ticket));
}

fn stop_server_updates(ctx: &mut HandlerContext, msg: StopServerUpdates) {
    ctx.state.server_updates.unsubscribe(ctx.session.conn);
    ctx.reply(&ResultStatus::ok(msg.ticket));
}

fn join_server(ctx: &mut HandlerContext, msg: JoinServer) {
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    // The request's user id is 0 in practice; fall back to the session.
    let joining = if msg.user_id != 0 { msg.user_id } else { account.id };
    match ctx.state.servers.join(msg.server_id, joining, ctx.session.conn) {
        Ok(_server) => {
            ctx.session.joined_server = Some(msg.server_id);
            ctx.reply(&ResultStatus::ok(msg.ticket));
        }
        Err(JoinError::NotFound) => {
            ctx.reply(&ResultStatus::fail(0x84, "GameServer not found", msg.ticket));
        }
        Err(JoinError::Full) => {
            ctx.reply(&ResultStatus::fail(0x87, "GameServer is already full", msg.ticket));
        }
        Err(JoinError::AlreadyJoined) => {
            ctx.reply(&ResultStatus::fail(1, "Already joined this server", msg.ticket));
        }
    }
}

fn leave_server(ctx: &mut HandlerContext, msg: LeaveServer) {
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    let Some(server_id) = ctx.session.joined_server.take() else {
        ctx.reply(&ResultStatus::fail(1, "Not joined to a server", msg.ticket));
        return;
    };
    let leaving = if msg.user_id != 0 { msg.user_id } else { account.id };
    ctx.state.servers.leave(server_id, leaving);
    ctx.reply(&ResultStatus::ok(msg.ticket));
}

fn update_server_info(ctx: &mut HandlerContext, msg: UpdateServerInfo) {
    let Some(_account) = require_account(ctx, msg.ticket) else {
        return;
    };
    let result = ctx.state.servers.update_owned(msg.server_id, ctx.session.conn, |s| {
        s.name = msg.name.clone();
        s.description = msg.description.clone();
        // Occupied slots come off the advertised capacity.
        s.players_total = msg.players_max.saturating_sub(msg.slots_occupied);
        s.level = msg.level;
        s.game_mode = msg.game_mode;
        s.hardcore = msg.hardcore;
        s.map = msg.map.clone();
        s.running = msg.running;
        s.data = msg.data.clone();
        s.property_mask = msg.property_mask;
    });
    match result {
        Ok(server) => {
            broadcast_server_update(ctx.state, &server);
            ctx.reply(&ResultStatus::ok(msg.ticket));
        }
        Err(UpdateError::NotFound) => {
            ctx.reply(&ResultStatus::fail(3, "No server", msg.ticket));
        }
        Err(UpdateError::NotOwner) => {
            ctx.reply(&ResultStatus::fail(1, "Not the server owner", msg.ticket));
        }
    }
}

/// The unlist ticket is an opcode: 11 delists the server, 14 marks it
/// running and snapshots it to its own players. Anything else is a bare
/// acknowledgement.
fn unlist_server(ctx: &mut HandlerContext, msg: UnlistServer) {
    let Some(_account) = require_account(ctx, msg.ticket) else {
        return;
    };
    match msg.ticket {
        UNLIST_REMOVE => {
            if let Some(server) = ctx.state.servers.remove(msg.server_id) {
                info!(conn = ctx.session.conn, server_id = msg.server_id, "game server delisted");
                broadcast_server_removal(ctx.state, msg.server_id, server.running);
            }
            if ctx.session.owned_server == Some(msg.server_id) {
                ctx.session.owned_server = None;
            }
        }
        UNLIST_START => {
            let Some(server) = ctx.state.servers.set_running(msg.server_id, true) else {
                ctx.reply(&ResultStatus::fail(1, "ServerId does not exist", msg.ticket));
                return;
            };
            info!(conn = ctx.session.conn, server_id = msg.server_id, "game server started");
            let snapshot = server_info(&server, 0);
            for &conn in server.players.values() {
                ctx.push_to(conn, &snapshot);
            }
        }
        other => {
            debug!(conn = ctx.session.conn, ticket = other, "unlist with unrecognized ticket");
        }
    }
    ctx.reply(&ResultStatus::ok(msg.ticket));
}

fn connect_to_server(ctx: &mut HandlerContext, msg: ConnectToServer) {
    let Some(account) = require_account(ctx, msg.ticket) else {
        return;
    };
    let Some(server) = ctx.state.servers.get(msg.server_id) else {
        ctx.reply(&ResultStatus::fail(1, "Unknown server", msg.ticket));
        return;
    };

    let nonce = ctx.state.crypto.create_nonce();
    ctx.push_to(
        server.owner_conn,
        &PlayerConnecting {
            nonce: nonce.clone(),
            char_id: account.id,
            name: account.player_name.clone(),
            owner_id: account.id,
            owner_name: account.user_name_stripped().to_string(),
            guild_id: 0,
            guild_name: String::new(),
            guild_role: 0,
            data: account.user_data.clone(),
        },
    );
    ctx.reply(&ConnectToServerReply {
        perm_id: account.id,
        server_id: server.id,
        ip: server.ip.clone(),
        port: server.port,
        nonce,
        error_code: 0,
        error_msg: String::new(),
        ticket: msg.ticket,
    });
}

/// The hosting connection reports a seated player. No reply.
fn player_joined_server(ctx: &mut HandlerContext, msg: PlayerJoinedServer) {
    let Some(server_id) = ctx.session.owned_server else {
        return;
    };
    if let Some(server) = ctx.state.servers.add_player(server_id, msg.perm_id, 0) {
        broadcast_server_update(ctx.state, &server);
    }
}

/// The hosting connection reports a departed player. No reply.
fn player_left_server(ctx: &mut HandlerContext, msg: PlayerLeftServer) {
    let Some(server_id) = ctx.session.owned_server else {
        return;
    };
    if let Some(server) = ctx.state.servers.remove_player(server_id, msg.perm_id) {
        broadcast_server_update(ctx.state, &server);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::tests::Harness;
    use crate::session::Session;

    fn list_server(h: &Harness, session: &mut Session, name: &str, capacity: u8) -> ServerId {
        h.send(
            session,
            &RegisterServer {
                name: name.into(),
                description: String::new(),
                port: 5479,
                server_type: 6,
                lobby_id: 0,
                version: String::new(),
                players_total: capacity,
                players_ai: 0,
                level: 1,
                game_mode: 4,
                hardcore: false,
                map: String::new(),
                automatic_join: false,
                data: vec![],
                ticket: 99,
            },
        );
        h.sink.clear();
        session.owned_server.unwrap()
    }

    #[test]
    fn test_lobby_ops_require_login() {
        let h = Harness::new();
        let mut session = Session::new(1);
        h.send(&mut session, &RequestMotd { ticket: 5 });
        match &h.sink.sent_to(1)[..] {
            [AppMessage::ResultStatus(status)] => {
                assert_eq!(status.error_code, 1);
                assert_eq!(status.error_msg, "Not logged in");
            }
            other => panic!("expected ResultStatus, got {other:?}"),
        }
    }

    #[test]
    fn test_register_nickname_rejects_nonzero_owner() {
        let h = Harness::new();
        let mut session = Session::new(1);
        h.login(&mut session, "alice");

        h.send(&mut session, &RegisterNickname { owner_id: 7, name: "Knight".into(), ticket: 3 });
        match &h.sink.sent_to(1)[..] {
            [AppMessage::StatusWithId(status)] => {
                assert_eq!(status.error_code, 1);
                assert_eq!(status.error_msg, "Incorrect account");
                // The failure echoes the request's owner id.
                assert_eq!(status.id, 7);
            }
            other => panic!("expected StatusWithId, got {other:?}"),
        }
        assert_ne!(session.stage, AuthStage::NicknameSelected);
    }

    #[test]
    fn test_nickname_flow_updates_account() {
        let h = Harness::new();
        let mut session = Session::new(1);
        let id = h.login(&mut session, "alice");

        h.send(&mut session, &RegisterNickname { owner_id: 0, name: "Knight".into(), ticket: 3 });
        h.send(
            &mut session,
            &ConfirmNickname {
                user_id: id,
                mail: "a@example.com".into(),
                data: vec![1, 2],
                ticket: 4,
            },
        );

        let stored = h.state.accounts.get(id).unwrap();
        assert_eq!(stored.player_name, "Knight");
        assert_eq!(stored.email, "a@example.com");
        assert_eq!(stored.user_data, vec![1, 2]);
        assert_eq!(session.stage, AuthStage::NicknameSelected);
    }

    #[test]
    fn test_select_nickname_replies_profile_then_ok() {
        let h = Harness::new();
        let mut session = Session::new(1);
        let id = h.login(&mut session, "alice");
        h.send(&mut session, &RegisterNickname { owner_id: 0, name: "Knight".into(), ticket: 3 });
        h.sink.clear();

        h.send(&mut session, &SelectNickname { char_id: id, ticket: 4 });
        let sent = h.sink.sent_to(1);
        match &sent[0] {
            AppMessage::SelectNicknameReply(reply) => {
                assert_eq!(reply.profile.char_id, id);
                assert_eq!(reply.profile.name, "Knight");
                assert_eq!(reply.profile.owner_name, "alice");
            }
            other => panic!("expected SelectNicknameReply, got {other:?}"),
        }
        assert!(matches!(&sent[1], AppMessage::ResultStatus(s) if s.error_code == 0));
    }

    #[test]
    fn test_user_info_requires_matching_account() {
        let h = Harness::new();
        let mut session = Session::new(1);
        let id = h.login(&mut session, "alice");

        h.send(&mut session, &GetUserInfo { user_id: id + 1, ticket: 5 });
        match &h.sink.sent_to(1)[..] {
            [AppMessage::ResultStatus(status)] => assert_eq!(status.error_code, 1),
            other => panic!("expected ResultStatus, got {other:?}"),
        }
        h.sink.clear();

        h.send(&mut session, &GetUserInfo { user_id: id, ticket: 6 });
        let sent = h.sink.sent_to(1);
        assert!(matches!(&sent[0], AppMessage::SendUserInfo(info) if info.user_id == id));
        assert!(matches!(&sent[1], AppMessage::ResultStatus(s) if s.error_code == 0));
    }

    #[test]
    fn test_motd_substitutes_username() {
        let h = Harness::new();
        let mut session = Session::new(1);
        h.login(&mut session, "alice#42");

        h.send(&mut session, &RequestMotd { ticket: 7 });
        match &h.sink.sent_to(1)[..] {
            [AppMessage::SendMotd(motd)] => {
                assert_eq!(motd.text, b"Welcome, alice!".to_vec());
            }
            other => panic!("expected SendMotd, got {other:?}"),
        }
    }

    #[test]
    fn test_chat_server_info_comes_from_config() {
        let h = Harness::new();
        let mut session = Session::new(1);
        h.login(&mut session, "alice");

        h.send(&mut session, &GetChatServer { server_type: 6, ticket: 8 });
        let sent = h.sink.sent_to(1);
        match &sent[0] {
            AppMessage::SendChatServerInfo(info) => {
                assert_eq!(info.server_id, 1);
                assert_eq!(info.ip, h.state.config.chat_ip);
                assert_eq!(info.port, h.state.config.chat_port);
            }
            other => panic!("expected SendChatServerInfo, got {other:?}"),
        }
    }

    #[test]
    fn test_cd_keys_reply_static_pool() {
        let h = Harness::new();
        let mut session = Session::new(1);
        let id = h.login(&mut session, "alice");

        h.send(&mut session, &GetCdKeys { user_id: id, ticket: 9 });
        let sent = h.sink.sent_to(1);
        match &sent[0] {
            AppMessage::SendCdKey(key) => {
                assert_eq!(key.cd_key, CD_KEY_PLACEHOLDER);
                assert_eq!(key.key_pool, CD_KEY_POOL);
            }
            other => panic!("expected SendCdKey, got {other:?}"),
        }
    }

    #[test]
    fn test_join_missing_server() {
        let h = Harness::new();
        let mut session = Session::new(1);
        h.login(&mut session, "alice");

        h.send(&mut session, &JoinServer { user_id: 0, server_id: 999, ticket: 10 });
        match &h.sink.sent_to(1)[..] {
            [AppMessage::ResultStatus(status)] => {
                assert_eq!(status.error_code, 0x84);
                assert_eq!(status.error_msg, "GameServer not found");
            }
            other => panic!("expected ResultStatus, got {other:?}"),
        }
        assert!(session.joined_server.is_none());
    }

    #[test]
    fn test_leave_without_join_fails() {
        let h = Harness::new();
        let mut session = Session::new(1);
        h.login(&mut session, "alice");

        h.send(&mut session, &LeaveServer { user_id: 0, ticket: 11 });
        match &h.sink.sent_to(1)[..] {
            [AppMessage::ResultStatus(status)] => {
                assert_eq!(status.error_code, 1);
                assert_eq!(status.error_msg, "Not joined to a server");
            }
            other => panic!("expected ResultStatus, got {other:?}"),
        }
    }

    #[test]
    fn test_update_server_info_checks_owner() {
        let h = Harness::new();
        let mut host = Session::new(1);
        let mut other = Session::new(2);
        h.login(&mut host, "host");
        h.login(&mut other, "other");
        let server_id = list_server(&h, &mut host, "game1", 4);

        let update = UpdateServerInfo {
            server_id,
            name: "game1".into(),
            description: "updated".into(),
            players_max: 6,
            slots_occupied: 2,
            level: 1,
            game_mode: 4,
            hardcore: false,
            map: String::new(),
            running: false,
            data: vec![],
            property_mask: 0,
            ticket: 12,
        };

        h.send(&mut other, &update);
        match &h.sink.sent_to(2)[..] {
            [AppMessage::ResultStatus(status)] => assert_eq!(status.error_code, 1),
            msgs => panic!("expected ResultStatus, got {msgs:?}"),
        }
        h.sink.clear();

        h.send(&mut host, &update);
        match h.sink.sent_to(1).last().unwrap() {
            AppMessage::ResultStatus(status) => assert_eq!(status.error_code, 0),
            other => panic!("expected ResultStatus, got {other:?}"),
        }
        let server = h.state.servers.get(server_id).unwrap();
        assert_eq!(server.description, "updated");
        // Occupied slots come off the advertised capacity.
        assert_eq!(server.players_total, 4);

        let mut missing = update.clone();
        missing.server_id = 999;
        h.sink.clear();
        h.send(&mut host, &missing);
        match &h.sink.sent_to(1)[..] {
            [AppMessage::ResultStatus(status)] => assert_eq!(status.error_code, 3),
            msgs => panic!("expected ResultStatus, got {msgs:?}"),
        }
    }

    #[test]
    fn test_connect_to_server_notifies_host() {
        let h = Harness::new();
        let mut host = Session::new(1);
        let mut player = Session::new(2);
        h.login(&mut host, "host");
        let player_id = h.login(&mut player, "player");
        let server_id = list_server(&h, &mut host, "game1", 4);

        h.send(&mut player, &ConnectToServer { server_id, ticket: 13 });

        let connecting = h
            .sink
            .sent_to(1)
            .into_iter()
            .find_map(|m| match m {
                AppMessage::PlayerConnecting(p) => Some(p),
                _ => None,
            })
            .unwrap();
        assert_eq!(connecting.owner_id, player_id);

        match h.sink.sent_to(2).last().unwrap() {
            AppMessage::ConnectToServerReply(reply) => {
                assert_eq!(reply.error_code, 0);
                assert_eq!(reply.server_id, server_id);
                assert_eq!(reply.ip, h.state.config.lobby_ip);
                // Both sides hold the same nonce.
                assert_eq!(reply.nonce, connecting.nonce);
            }
            other => panic!("expected ConnectToServerReply, got {other:?}"),
        }
    }

    #[test]
    fn test_connect_to_missing_server() {
        let h = Harness::new();
        let mut player = Session::new(1);
        h.login(&mut player, "player");

        h.send(&mut player, &ConnectToServer { server_id: 999, ticket: 14 });
        match &h.sink.sent_to(1)[..] {
            [AppMessage::ResultStatus(status)] => {
                assert_eq!(status.error_code, 1);
                assert_eq!(status.error_msg, "Unknown server");
            }
            other => panic!("expected ResultStatus, got {other:?}"),
        }
    }

    #[test]
    fn test_host_maintains_player_set() {
        let h = Harness::new();
        let mut host = Session::new(1);
        h.login(&mut host, "host");
        let server_id = list_server(&h, &mut host, "game1", 4);

        h.send(&mut host, &PlayerJoinedServer { perm_id: 42, ticket: 0 });
        assert_eq!(h.state.servers.get(server_id).unwrap().players.len(), 2);
        // No reply for host bookkeeping pushes.
        assert!(h.sink.sent_to(1).is_empty());

        h.send(&mut host, &PlayerLeftServer { perm_id: 42, ticket: 0 });
        assert_eq!(h.state.servers.get(server_id).unwrap().players.len(), 1);

        // Without an owned server the report is ignored.
        let mut bystander = Session::new(2);
        h.login(&mut bystander, "bystander");
        h.send(&mut bystander, &PlayerJoinedServer { perm_id: 43, ticket: 0 });
        assert_eq!(h.state.servers.get(server_id).unwrap().players.len(), 1);
    }

    #[test]
    fn test_login_observer_gets_online_snapshot() {
        let h = Harness::new();
        let mut alice = Session::new(1);
        let alice_id = h.login(&mut alice, "alice");

        let mut observer = Session::new(2);
        h.login(&mut observer, "observer");
        h.send(&mut observer, &RegObserverUserLogin { send_all: true, ticket: 15 });

        let snapshot: Vec<_> = h
            .sink
            .sent_to(2)
            .into_iter()
            .filter_map(|m| match m {
                AppMessage::UserLoggedIn(u) => Some(u.user_id),
                _ => None,
            })
            .collect();
        assert!(snapshot.contains(&alice_id));
    }
}

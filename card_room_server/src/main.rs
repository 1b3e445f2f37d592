use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use dashmap::DashMap;
use futures_util::{stream::StreamExt, SinkExt};
use parking_lot::Mutex as P_Mutex;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

use card_room_core::{
    ClientMessage, PlayerId, RoomError, RoomState, RoomStatus, ServerMessage,
};

// 服务器全局状态。整个进程只有一个房间，
// 房间在启动时创建并以句柄形式传入各个连接任务。
struct AppState {
    room: Room,
}

// 房间聚合 + 订阅者注册表。
// state 锁串行化所有状态机转换：两个事件绝不会在同一次转换内交错。
// 锁内只计算，不做任何 await；消息在释放锁之后才投递。
struct Room {
    state: P_Mutex<RoomState>,
    // 将 PlayerId 映射到具体的网络连接（发往该玩家写任务的通道）
    connections: DashMap<PlayerId, mpsc::Sender<ServerMessage>>,
}

impl Room {
    fn new() -> Self {
        Room {
            state: P_Mutex::new(RoomState::new()),
            connections: DashMap::new(),
        }
    }
}

type SharedState = Arc<AppState>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let state = SharedState::new(AppState { room: Room::new() });

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/game-status", get(game_status))
        .route("/api/health", get(health))
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("服务器正在监听 {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await.unwrap(), app)
        .await
        .unwrap();
}

/// 只读的房间状态查询，不触发任何状态机转换
async fn game_status(State(state): State<SharedState>) -> Json<RoomStatus> {
    Json(state.room.state.lock().status())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// 处理 WebSocket 连接请求
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();

    // 创建一个 MPSC 通道，用于从其他任务接收要发送的消息
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);

    // 启动一个新任务，专门负责将 MPSC 通道中的消息发送到 WebSocket
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = serde_json::to_string(&msg).unwrap();
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开，退出任务
                break;
            }
        }
    });

    // 当前连接绑定的玩家，入座成功后填充。
    // 一个连接至多对应一个玩家。
    let mut player_context: Option<PlayerId> = None;

    // 主循环，处理从客户端接收到的消息
    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    handle_client_message(client_msg, &state, &tx, &mut player_context).await;
                }
                Err(e) => {
                    // 坏请求只记日志，绝不让它弄崩网关
                    warn!("解析消息失败: {}", e);
                    let _ = tx
                        .send(ServerMessage::Error {
                            message: "无法解析的消息".to_string(),
                        })
                        .await;
                }
            }
        }
    }

    // 客户端断开连接，执行清理工作
    if let Some(player_id) = player_context {
        handle_disconnect(&state, player_id).await;
    }
    info!("客户端连接关闭");
}

/// 核心事件路由：校验 → 状态机转换 → 派发视图。
///
/// 所有转换都在房间锁内完成并在锁内取好要发的数据，
/// 广播在锁外进行，单个订阅者投递失败不影响其他订阅者。
async fn handle_client_message(
    msg: ClientMessage,
    state: &SharedState,
    tx: &mpsc::Sender<ServerMessage>,
    context: &mut Option<PlayerId>,
) {
    match msg {
        ClientMessage::Join { name } => {
            if context.is_some() {
                let _ = tx
                    .send(ServerMessage::Error {
                        message: "你已经在房间里了".to_string(),
                    })
                    .await;
                return;
            }

            let outcome = {
                let mut room = state.room.state.lock();
                room.join(name).map(|player| (player, room.roster()))
            };
            match outcome {
                Ok((player, roster)) => {
                    state.room.connections.insert(player.id, tx.clone());
                    *context = Some(player.id);
                    info!("{} 入座（{} 号位）", player.name, roster.len());

                    // 私发本人记录，再向全房间广播新花名册
                    let _ = tx.send(ServerMessage::Joined { player }).await;
                    broadcast(&state.room, &ServerMessage::RosterUpdated { players: roster });
                }
                // 入座被拒只通知请求者本人
                Err(RoomError::RoomFull) => {
                    let _ = tx.send(ServerMessage::RoomFull).await;
                }
                Err(RoomError::GameInProgress) => {
                    let _ = tx.send(ServerMessage::GameInProgress).await;
                }
                Err(e) => {
                    let _ = tx.send(ServerMessage::Error { message: e.to_string() }).await;
                }
            }
        }
        ClientMessage::Ready => {
            let Some(player_id) = *context else {
                let _ = tx
                    .send(ServerMessage::Error {
                        message: "请先入座".to_string(),
                    })
                    .await;
                return;
            };

            let outcome = {
                let mut room = state.room.state.lock();
                room.set_ready(player_id)
                    .map(|start| (start, room.roster(), room.current_turn))
            };
            match outcome {
                Ok((start, roster, current_turn)) => {
                    broadcast(
                        &state.room,
                        &ServerMessage::RosterUpdated { players: roster.clone() },
                    );

                    if let Some(start) = start {
                        info!("所有玩家已准备，开局，首先行动：{}", start.current_turn);

                        // 手牌必须逐个玩家私发，绝不广播
                        for (pid, hand) in start.hands {
                            send_to(&state.room, pid, ServerMessage::RoundStarted {
                                hand,
                                current_turn: start.current_turn,
                            });
                        }
                        broadcast(
                            &state.room,
                            &ServerMessage::StateUpdated { players: roster, current_turn },
                        );
                    }
                }
                Err(e) => {
                    let _ = tx.send(ServerMessage::Error { message: e.to_string() }).await;
                }
            }
        }
        ClientMessage::Play { indices } => {
            let Some(player_id) = *context else {
                let _ = tx
                    .send(ServerMessage::Error {
                        message: "请先入座".to_string(),
                    })
                    .await;
                return;
            };

            let outcome = {
                let mut room = state.room.state.lock();
                room.play_cards(player_id, &indices)
                    .map(|out| (out, room.roster(), room.current_turn))
            };
            match outcome {
                Ok((out, roster, current_turn)) => {
                    broadcast(
                        &state.room,
                        &ServerMessage::CardsPlayed {
                            player_id: out.player_id,
                            player_name: out.player_name.clone(),
                            cards: out.cards.clone(),
                        },
                    );
                    broadcast(
                        &state.room,
                        &ServerMessage::StateUpdated { players: roster, current_turn },
                    );

                    if let Some(winner) = out.winner {
                        info!("{} 打空手牌获胜，本局结束", winner);
                        broadcast(&state.room, &ServerMessage::RoundEnded { winner });
                    }
                }
                // 前置条件失败（没轮到、没开局、索引不合法）回给行动者本人
                Err(e) => {
                    let _ = tx.send(ServerMessage::Error { message: e.to_string() }).await;
                }
            }
        }
    }
}

/// 玩家断开连接后的处理：离座，必要时中止并重置本局
async fn handle_disconnect(state: &SharedState, player_id: PlayerId) {
    state.room.connections.remove(&player_id);

    let outcome = {
        let mut room = state.room.state.lock();
        room.leave(player_id).map(|out| (out, room.roster()))
    };
    if let Some((out, roster)) = outcome {
        info!("{} 离座", out.player.name);
        broadcast(&state.room, &ServerMessage::RosterUpdated { players: roster });
        if out.aborted {
            broadcast(
                &state.room,
                &ServerMessage::RoundAborted {
                    reason: "有玩家离开了牌局".to_string(),
                },
            );
        }
    }
}

/// 向房间内所有订阅者广播消息。
/// 投递是 fire-and-forget 的 `try_send`：某个订阅者缓冲已满或已经
/// 断开时，丢弃发给它的这一条并记日志，绝不阻塞、也绝不影响对
/// 其余订阅者的投递。断开的连接由其自己的 handle_socket 任务清理。
fn broadcast(room: &Room, message: &ServerMessage) {
    for entry in room.connections.iter() {
        if entry.value().try_send(message.clone()).is_err() {
            warn!("向玩家 {} 投递消息失败（缓冲已满或已断开）", entry.key());
        }
    }
}

/// 向单个玩家私发消息（用于手牌等保密内容）
fn send_to(room: &Room, player_id: PlayerId, message: ServerMessage) {
    if let Some(conn) = room.connections.get(&player_id) {
        if conn.value().try_send(message).is_err() {
            warn!("向玩家 {} 私发消息失败（缓冲已满或已断开）", player_id);
        }
    }
}

// --- 单元测试 ---

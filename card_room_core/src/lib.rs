//! # 共享牌桌核心逻辑库
//!
//! 这个 `core` crate 包含了共享牌桌游戏的所有核心状态管理：
//! 牌堆生成与洗牌、发牌、房间状态机（入座、准备、出牌、胜负判定、
//! 断线重置），以及客户端-服务器通信消息的定义。
//! 它的设计目标是与具体实现（如网络服务器、客户端UI）解耦，
//! 使其可以被任何上层应用复用。

mod card;
mod error;
mod logic;
mod message;
mod state;

pub use card::*;

pub use error::*;

pub use logic::*;

pub use message::*;

pub use state::*;

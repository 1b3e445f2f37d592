use crate::card::{shuffled_deck, Card};
use crate::error::RoomError;
use crate::state::{Player, PlayerId, RoomState};
use uuid::Uuid;

// --- 核心游戏流程 ---

/// 开局时各玩家拿到的私有手牌和首个行动者
#[derive(Debug, Clone)]
pub struct RoundStart {
    /// 每个玩家的私有手牌，只能单独发给本人
    pub hands: Vec<(PlayerId, Vec<Card>)>,
    /// 首个行动者，即一号座位的玩家
    pub current_turn: PlayerId,
}

/// 一次成功出牌产生的全部后果
#[derive(Debug, Clone)]
pub struct PlayOutcome {
    pub player_id: PlayerId,
    pub player_name: String,
    /// 本次打出的具体牌面
    pub cards: Vec<Card>,
    /// 下一个行动者；本局结束时为 None
    pub next_turn: Option<PlayerId>,
    /// 手牌清空的玩家即为赢家，本局随之结束
    pub winner: Option<String>,
}

/// 玩家离开座位的后果
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub player: Player,
    /// 进行中的牌局因离开被强制中止
    pub aborted: bool,
}

/// 把牌堆按座位顺序切成连续的等长段发给每个玩家。
///
/// 每人拿 `deck.len() / players.len()`（向下取整）张；
/// 除不尽的余牌不发给任何人，直接弃置 —— 这是沿用的既定行为，
/// 不做重新分配。
pub fn deal(deck: &[Card], players: &mut [Player]) {
    if players.is_empty() {
        return;
    }
    let cards_per_player = deck.len() / players.len();
    for (idx, player) in players.iter_mut().enumerate() {
        let start = idx * cards_per_player;
        player.hand = deck[start..start + cards_per_player].to_vec();
    }
}

impl RoomState {
    /// 处理加入请求。
    ///
    /// 满员或牌局进行中时拒绝，否则在队尾追加一个未准备的新玩家
    /// 并返回其完整记录（含空手牌）。未提供昵称时按座位号生成。
    pub fn join(&mut self, name: Option<String>) -> Result<Player, RoomError> {
        if self.players.len() >= self.capacity {
            return Err(RoomError::RoomFull);
        }
        if self.in_progress {
            return Err(RoomError::GameInProgress);
        }

        let name = match name {
            Some(n) if !n.trim().is_empty() => n,
            _ => format!("玩家{}", self.players.len() + 1),
        };
        let player = Player {
            id: Uuid::new_v4(),
            name,
            hand: Vec::new(),
            ready: false,
        };
        self.players.push(player.clone());
        Ok(player)
    }

    /// 标记玩家已准备。
    ///
    /// 若标记后满足开局条件（至少2人且全部准备），自动开局并返回
    /// `Some(RoundStart)`；否则返回 `Ok(None)`。
    ///
    /// 牌局进行中时拒绝：开局后准备标志仍是 true，不拒绝的话
    /// 一条多余的准备消息就会触发重新发牌。
    pub fn set_ready(&mut self, player_id: PlayerId) -> Result<Option<RoundStart>, RoomError> {
        if self.in_progress {
            return Err(RoomError::GameInProgress);
        }
        let seat = self.seat_of(player_id).ok_or(RoomError::UnknownPlayer)?;
        self.players[seat].ready = true;

        let all_ready = self.players.len() >= 2 && self.players.iter().all(|p| p.ready);
        if all_ready {
            Ok(self.start_round())
        } else {
            Ok(None)
        }
    }

    /// 开始新的一局：生成洗好的牌堆、发牌、设置进行中标志，
    /// 并把行动权交给一号座位。不满2人时静默不做任何事。
    pub fn start_round(&mut self) -> Option<RoundStart> {
        if self.players.len() < 2 {
            return None;
        }

        let deck = shuffled_deck();
        deal(&deck, &mut self.players);

        self.in_progress = true;
        let first = self.players[0].id;
        self.current_turn = Some(first);

        Some(RoundStart {
            hands: self
                .players
                .iter()
                .map(|p| (p.id, p.hand.clone()))
                .collect(),
            current_turn: first,
        })
    }

    /// 玩家离开座位。
    ///
    /// 若牌局正在进行，无条件中止本局：清掉进行中标志和行动权，
    /// 清空所有剩余玩家的手牌并重置准备状态。这里选择简单的硬重置
    /// 而不是重排行动顺序。
    pub fn leave(&mut self, player_id: PlayerId) -> Option<LeaveOutcome> {
        let seat = self.seat_of(player_id)?;
        let player = self.players.remove(seat);

        let aborted = self.in_progress;
        if aborted {
            self.in_progress = false;
            self.current_turn = None;
            for p in &mut self.players {
                p.hand.clear();
                p.ready = false;
            }
        }

        Some(LeaveOutcome { player, aborted })
    }

    /// 处理一次出牌。
    ///
    /// 前置条件（牌局进行中、轮到本人）不满足时返回错误而不是
    /// 静默忽略。索引在做任何改动之前整体校验：非空、不重复、
    /// 全部在当前手牌范围内，否则拒绝，保证手牌不会被坏请求破坏。
    ///
    /// 成功后行动权交给座位顺序上的下一个玩家（末位回绕到首位）。
    /// 若本次出牌后手牌为空，本局结束：清空所有人的手牌、重置
    /// 准备状态，并报告该玩家获胜。
    pub fn play_cards(
        &mut self,
        player_id: PlayerId,
        indices: &[usize],
    ) -> Result<PlayOutcome, RoomError> {
        if !self.in_progress {
            return Err(RoomError::RoundNotActive);
        }
        if self.current_turn != Some(player_id) {
            return Err(RoomError::NotYourTurn);
        }
        let seat = self.seat_of(player_id).ok_or(RoomError::UnknownPlayer)?;

        let hand_len = self.players[seat].hand.len();
        if indices.is_empty() || indices.iter().any(|&i| i >= hand_len) {
            return Err(RoomError::InvalidSelection);
        }
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(RoomError::InvalidSelection);
        }

        // 索引指的是出牌时刻手牌中的位置，从高位往低位移除才不会错位
        let player_name = self.players[seat].name.clone();
        let mut played: Vec<Card> = sorted
            .iter()
            .rev()
            .map(|&i| self.players[seat].hand.remove(i))
            .collect();
        played.reverse(); // 恢复按手牌位置从前到后的顺序

        if self.players[seat].hand.is_empty() {
            // 手牌打空即获胜，本局结束
            self.in_progress = false;
            self.current_turn = None;
            for p in &mut self.players {
                p.hand.clear();
                p.ready = false;
            }
            return Ok(PlayOutcome {
                player_id,
                player_name: player_name.clone(),
                cards: played,
                next_turn: None,
                winner: Some(player_name),
            });
        }

        // 按当前座位数回绕推进行动权
        let next_seat = (seat + 1) % self.players.len();
        let next = self.players[next_seat].id;
        self.current_turn = Some(next);

        Ok(PlayOutcome {
            player_id,
            player_name,
            cards: played,
            next_turn: Some(next),
            winner: None,
        })
    }
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::standard_deck;
    use std::collections::HashSet;

    // 辅助函数：建一个已有若干玩家的房间
    fn setup_room(names: &[&str]) -> (RoomState, Vec<PlayerId>) {
        let mut room = RoomState::new();
        let ids = names
            .iter()
            .map(|n| room.join(Some(n.to_string())).unwrap().id)
            .collect();
        (room, ids)
    }

    // 辅助函数：让所有玩家准备，返回开局信息
    fn ready_all(room: &mut RoomState, ids: &[PlayerId]) -> RoundStart {
        let mut start = None;
        for &id in ids {
            start = room.set_ready(id).unwrap();
        }
        start.expect("所有人准备后应该自动开局")
    }

    #[test]
    fn test_deal_even_split_no_overlap() {
        // 1~4 人各拿 floor(52/n) 张，且各手牌互不重叠
        for n in 1..=4usize {
            let deck = standard_deck();
            let mut players: Vec<Player> = (0..n)
                .map(|i| Player {
                    id: Uuid::new_v4(),
                    name: format!("玩家{}", i + 1),
                    hand: vec![],
                    ready: true,
                })
                .collect();
            deal(&deck, &mut players);

            let expected = 52 / n;
            let mut seen = HashSet::new();
            for p in &players {
                assert_eq!(p.hand.len(), expected);
                for c in &p.hand {
                    assert!(seen.insert(*c), "同一张牌被发给了两个人");
                }
            }
            assert_eq!(seen.len(), expected * n);
        }
    }

    #[test]
    fn test_deal_drops_remainder() {
        // 52 / 3 = 17 余 1，余牌弃置不发
        let deck = standard_deck();
        let mut players: Vec<Player> = (0..3)
            .map(|i| Player {
                id: Uuid::new_v4(),
                name: format!("玩家{}", i + 1),
                hand: vec![],
                ready: true,
            })
            .collect();
        deal(&deck, &mut players);
        let total: usize = players.iter().map(|p| p.hand.len()).sum();
        assert_eq!(total, 51);
    }

    #[test]
    fn test_join_full_room_rejected() {
        let (mut room, _) = setup_room(&["A", "B", "C", "D"]);
        let err = room.join(Some("E".to_string())).unwrap_err();
        assert_eq!(err, RoomError::RoomFull);
        assert_eq!(room.players.len(), 4);
    }

    #[test]
    fn test_join_during_round_rejected() {
        let (mut room, ids) = setup_room(&["A", "B"]);
        ready_all(&mut room, &ids);
        let err = room.join(Some("C".to_string())).unwrap_err();
        assert_eq!(err, RoomError::GameInProgress);
    }

    #[test]
    fn test_join_default_name() {
        let mut room = RoomState::new();
        let p1 = room.join(None).unwrap();
        let p2 = room.join(Some("  ".to_string())).unwrap();
        assert_eq!(p1.name, "玩家1");
        assert_eq!(p2.name, "玩家2");
    }

    #[test]
    fn test_single_player_ready_does_not_start() {
        let (mut room, ids) = setup_room(&["A"]);
        let start = room.set_ready(ids[0]).unwrap();
        assert!(start.is_none());
        assert!(!room.in_progress);
        assert_eq!(room.current_turn, None);
    }

    #[test]
    fn test_all_ready_starts_round() {
        let (mut room, ids) = setup_room(&["Alice", "Bob"]);
        let start = ready_all(&mut room, &ids);

        assert!(room.in_progress);
        assert_eq!(start.current_turn, ids[0]);
        assert_eq!(room.current_turn, Some(ids[0]));
        // 两人各发 26 张
        assert_eq!(start.hands.len(), 2);
        for p in &room.players {
            assert_eq!(p.hand.len(), 26);
        }
    }

    #[test]
    fn test_ready_during_round_rejected() {
        // 开局后多余的准备消息不能触发重新发牌
        let (mut room, ids) = setup_room(&["A", "B"]);
        ready_all(&mut room, &ids);
        let hand_before = room.players[0].hand.clone();

        let err = room.set_ready(ids[0]).unwrap_err();
        assert_eq!(err, RoomError::GameInProgress);
        assert_eq!(room.players[0].hand, hand_before);
    }

    #[test]
    fn test_play_advances_turn_and_wraps() {
        let (mut room, ids) = setup_room(&["A", "B", "C"]);
        ready_all(&mut room, &ids);

        // A 出牌后轮到 B，依次轮转，C 之后回绕到 A
        let out = room.play_cards(ids[0], &[0]).unwrap();
        assert_eq!(out.next_turn, Some(ids[1]));
        let out = room.play_cards(ids[1], &[0]).unwrap();
        assert_eq!(out.next_turn, Some(ids[2]));
        let out = room.play_cards(ids[2], &[0]).unwrap();
        assert_eq!(out.next_turn, Some(ids[0]));
        assert_eq!(room.current_turn, Some(ids[0]));
    }

    #[test]
    fn test_play_out_of_turn_rejected() {
        let (mut room, ids) = setup_room(&["A", "B"]);
        ready_all(&mut room, &ids);

        let before = room.players[1].hand.clone();
        let err = room.play_cards(ids[1], &[0]).unwrap_err();
        assert_eq!(err, RoomError::NotYourTurn);
        // 手牌和行动权都不能被改动
        assert_eq!(room.players[1].hand, before);
        assert_eq!(room.current_turn, Some(ids[0]));
    }

    #[test]
    fn test_play_when_not_in_progress_rejected() {
        let (mut room, ids) = setup_room(&["A", "B"]);
        let err = room.play_cards(ids[0], &[0]).unwrap_err();
        assert_eq!(err, RoomError::RoundNotActive);
    }

    #[test]
    fn test_play_invalid_indices_rejected() {
        let (mut room, ids) = setup_room(&["A", "B"]);
        ready_all(&mut room, &ids);

        let before = room.players[0].hand.clone();
        // 空选择
        assert_eq!(room.play_cards(ids[0], &[]).unwrap_err(), RoomError::InvalidSelection);
        // 越界
        assert_eq!(room.play_cards(ids[0], &[26]).unwrap_err(), RoomError::InvalidSelection);
        // 重复
        assert_eq!(room.play_cards(ids[0], &[3, 3]).unwrap_err(), RoomError::InvalidSelection);
        // 任何一次失败都不能动过手牌
        assert_eq!(room.players[0].hand, before);
        assert_eq!(room.current_turn, Some(ids[0]));
    }

    #[test]
    fn test_play_removes_chosen_positions() {
        let (mut room, ids) = setup_room(&["A", "B"]);
        ready_all(&mut room, &ids);

        let hand = room.players[0].hand.clone();
        let out = room.play_cards(ids[0], &[0, 2]).unwrap();

        // 打出的正是出牌时刻位置 0 和 2 上的牌，顺序与请求一致
        assert_eq!(out.cards, vec![hand[0], hand[2]]);
        assert_eq!(room.players[0].hand.len(), 24);
        assert!(!room.players[0].hand.contains(&hand[0]));
        assert!(!room.players[0].hand.contains(&hand[2]));
        assert!(room.players[0].hand.contains(&hand[1]));
    }

    #[test]
    fn test_emptying_hand_wins_and_ends_round() {
        let (mut room, ids) = setup_room(&["Alice", "Bob"]);
        ready_all(&mut room, &ids);

        // 一次打空全部 26 张
        let all: Vec<usize> = (0..26).collect();
        let out = room.play_cards(ids[0], &all).unwrap();

        assert_eq!(out.winner.as_deref(), Some("Alice"));
        assert_eq!(out.next_turn, None);
        assert!(!room.in_progress);
        assert_eq!(room.current_turn, None);
        // 结算后所有人的手牌清空、准备状态重置
        for p in &room.players {
            assert!(p.hand.is_empty());
            assert!(!p.ready);
        }
    }

    #[test]
    fn test_leave_during_round_aborts() {
        let (mut room, ids) = setup_room(&["A", "B", "C"]);
        ready_all(&mut room, &ids);

        // 轮到谁离开都一样：无条件硬重置
        let out = room.leave(ids[0]).unwrap();
        assert!(out.aborted);
        assert_eq!(out.player.name, "A");
        assert!(!room.in_progress);
        assert_eq!(room.current_turn, None);
        for p in &room.players {
            assert!(p.hand.is_empty());
            assert!(!p.ready);
        }
    }

    #[test]
    fn test_leave_by_non_turn_player_also_aborts() {
        // 离开的不是行动者也一样硬重置：中止不看 current_turn
        let (mut room, ids) = setup_room(&["A", "B", "C"]);
        ready_all(&mut room, &ids);
        assert_eq!(room.current_turn, Some(ids[0]));

        let out = room.leave(ids[2]).unwrap();
        assert!(out.aborted);
        assert!(!room.in_progress);
        assert_eq!(room.current_turn, None);
        for p in &room.players {
            assert!(p.hand.is_empty());
            assert!(!p.ready);
        }
    }

    #[test]
    fn test_leave_when_waiting_does_not_abort() {
        let (mut room, ids) = setup_room(&["A", "B"]);
        let out = room.leave(ids[1]).unwrap();
        assert!(!out.aborted);
        assert_eq!(room.players.len(), 1);
        assert!(room.leave(ids[1]).is_none());
    }

    #[test]
    fn test_restart_after_abort() {
        // 中止后剩余玩家重新准备可以开新的一局
        let (mut room, ids) = setup_room(&["A", "B", "C"]);
        ready_all(&mut room, &ids);
        room.leave(ids[0]).unwrap();

        let start = ready_all(&mut room, &ids[1..]);
        assert!(room.in_progress);
        // 新一局的首个行动者是剩余座位中的一号位
        assert_eq!(start.current_turn, ids[1]);
        for p in &room.players {
            assert_eq!(p.hand.len(), 26);
        }
    }

    #[test]
    fn test_alice_bob_scenario() {
        // 场景：Alice 和 Bob 加入并全部准备 → 开局各 26 张，
        // 轮到 Alice；Alice 打出手牌前两个位置 → 剩 24 张，轮到 Bob
        let (mut room, ids) = setup_room(&["Alice", "Bob"]);
        let start = ready_all(&mut room, &ids);
        assert_eq!(start.current_turn, ids[0]);

        let alice_hand = room.players[0].hand.clone();
        let out = room.play_cards(ids[0], &[0, 1]).unwrap();

        assert_eq!(out.player_name, "Alice");
        assert_eq!(out.cards, vec![alice_hand[0], alice_hand[1]]);
        assert_eq!(room.players[0].hand.len(), 24);
        assert_eq!(room.current_turn, Some(ids[1]));

        // 花名册只暴露张数，不暴露牌面
        let roster = room.roster();
        assert_eq!(roster[0].card_count, 24);
        assert_eq!(roster[1].card_count, 26);
    }
}

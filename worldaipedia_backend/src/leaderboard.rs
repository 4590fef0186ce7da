//! High-score board for the arcade mini game.
//!
//! One document per player. A submission only touches the board when it
//! beats the stored score, so replays and refreshes can spam submits
//! without churning timestamps.

use crate::models::{collections, GameHighScore, User};
use crate::store::{Direction, Query, Store};
use anyhow::{bail, Result};
use chrono::Utc;

const DEFAULT_TOP: usize = 10;

#[derive(Clone)]
pub struct LeaderboardService {
    store: Store,
}

impl LeaderboardService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Records the score if it beats the player's stored best. Returns
    /// the entry that is on the board afterwards.
    pub fn submit(&self, player: &User, score: i64) -> Result<GameHighScore> {
        if score < 0 {
            bail!("score may not be negative");
        }
        if let Some(doc) = self.store.get(collections::HIGH_SCORES, &player.uid)? {
            let current: GameHighScore = doc.decode()?;
            if current.score >= score {
                return Ok(current);
            }
        }
        let entry = GameHighScore {
            uid: player.uid.clone(),
            username: player.username.clone(),
            score,
            achieved_at: Utc::now(),
        };
        self.store.set(
            collections::HIGH_SCORES,
            &player.uid,
            serde_json::to_value(&entry)?,
        )?;
        Ok(entry)
    }

    pub fn top(&self, limit: Option<usize>) -> Result<Vec<GameHighScore>> {
        let query = Query::collection(collections::HIGH_SCORES)
            .order_by("score", Direction::Descending)
            .limit(limit.unwrap_or(DEFAULT_TOP));
        let mut entries = Vec::new();
        for doc in self.store.query(query)? {
            entries.push(doc.decode::<GameHighScore>()?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn player(uid: &str, username: &str) -> User {
        User {
            uid: uid.into(),
            email: format!("{uid}@example.com"),
            username: username.into(),
            display_name: username.into(),
            photo_url: None,
            description: String::new(),
            is_admin: false,
            is_subscribed: true,
            plan: None,
            member_since: Utc.timestamp_millis_opt(0).unwrap(),
            followers: vec![],
            following: vec![],
            saved: vec![],
        }
    }

    fn setup() -> LeaderboardService {
        LeaderboardService::new(Store::in_memory().expect("store"))
    }

    #[test]
    fn only_improvements_replace_the_stored_entry() {
        let service = setup();
        let first = service.submit(&player("p1", "ada"), 100).unwrap();
        assert_eq!(first.score, 100);

        // A lower score leaves the board untouched.
        let kept = service.submit(&player("p1", "ada"), 40).unwrap();
        assert_eq!(kept.score, 100);
        assert_eq!(kept.achieved_at, first.achieved_at);

        // A tie is not an improvement either.
        let kept = service.submit(&player("p1", "ada"), 100).unwrap();
        assert_eq!(kept.achieved_at, first.achieved_at);

        // Beating it refreshes the username alongside the score.
        let beaten = service.submit(&player("p1", "ada_prime"), 180).unwrap();
        assert_eq!(beaten.score, 180);
        assert_eq!(beaten.username, "ada_prime");
    }

    #[test]
    fn top_is_score_descending_and_capped() {
        let service = setup();
        service.submit(&player("p1", "ada"), 300).unwrap();
        service.submit(&player("p2", "grace"), 500).unwrap();
        service.submit(&player("p3", "alan"), 100).unwrap();

        let board = service.top(None).unwrap();
        assert_eq!(
            board.iter().map(|e| e.score).collect::<Vec<_>>(),
            vec![500, 300, 100]
        );

        let board = service.top(Some(2)).unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].username, "grace");
    }

    #[test]
    fn negative_scores_are_rejected() {
        let service = setup();
        assert!(service.submit(&player("p1", "ada"), -1).is_err());
    }
}

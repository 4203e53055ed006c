use std::collections::BTreeMap;

use serde::Serialize;

use crate::hero_meta::{AttackType, Role};
use crate::reshape::HeroStatRow;

pub const MAX_TEAM_SIZE: u32 = 6;

/// One side of one match, built from the primary-hero rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamAggregate {
    pub match_uid: String,
    pub is_win: u8,
    pub num_vang: u32,
    pub num_strat: u32,
    pub num_duel: u32,
    pub players_on_team: u32,
    pub avg_hitrate: Option<f64>,
    pub num_melee: u32,
    pub num_hitscan: u32,
    pub num_projectile: u32,
    pub total_damage: f64,
    pub total_healing: f64,
    pub total_damage_taken: f64,
    pub total_deaths: i64,
    pub total_assists: i64,
    pub total_kills: i64,
    pub primary_attack_type: &'static str,
}

impl TeamAggregate {
    pub fn is_oversized(&self) -> bool {
        self.players_on_team > MAX_TEAM_SIZE
    }
}

#[derive(Default)]
struct TeamAccumulator {
    roles: [u32; 3],
    attacks: [u32; 3],
    players: u32,
    hit_rate_sum: f64,
    hit_rate_n: u32,
    damage: f64,
    healing: f64,
    damage_taken: f64,
    deaths: i64,
    assists: i64,
    kills: i64,
}

impl TeamAccumulator {
    fn add(&mut self, row: &HeroStatRow) {
        let role_idx = match row.role {
            Role::Vanguard => 0,
            Role::Strategist => 1,
            Role::Duelist => 2,
        };
        self.roles[role_idx] += 1;
        self.attacks[attack_index(row.attack_type)] += 1;
        self.players += 1;

        let session = &row.session;
        if let Some(rate) = session.hit_rate.filter(|r| r.is_finite()) {
            self.hit_rate_sum += rate;
            self.hit_rate_n += 1;
        }
        self.damage += session.hero_damage.unwrap_or(0.0);
        self.healing += session.hero_healed.unwrap_or(0.0);
        self.damage_taken += session.damage_taken.unwrap_or(0.0);
        // Combat counts come from the primary hero's session.
        self.deaths += session.deaths.unwrap_or(0);
        self.assists += session.assists.unwrap_or(0);
        self.kills += session.kills.unwrap_or(0);
    }

    fn finish(self, match_uid: String, is_win: bool) -> TeamAggregate {
        let num_melee = self.attacks[attack_index(AttackType::Melee)];
        let num_projectile = self.attacks[attack_index(AttackType::Projectile)];
        let num_hitscan = self.attacks[attack_index(AttackType::Hitscan)];
        TeamAggregate {
            match_uid,
            is_win: u8::from(is_win),
            num_vang: self.roles[0],
            num_strat: self.roles[1],
            num_duel: self.roles[2],
            players_on_team: self.players,
            avg_hitrate: (self.hit_rate_n > 0).then(|| self.hit_rate_sum / self.hit_rate_n as f64),
            num_melee,
            num_hitscan,
            num_projectile,
            total_damage: self.damage,
            total_healing: self.healing,
            total_damage_taken: self.damage_taken,
            total_deaths: self.deaths,
            total_assists: self.assists,
            total_kills: self.kills,
            primary_attack_type: primary_attack_type(num_melee, num_projectile, num_hitscan).label(),
        }
    }
}

fn attack_index(attack: AttackType) -> usize {
    match attack {
        AttackType::Melee => 0,
        AttackType::Projectile => 1,
        AttackType::Hitscan => 2,
    }
}

/// Attack type with the highest count. Ties go to the earliest of melee,
/// projectile, hitscan.
pub fn primary_attack_type(melee: u32, projectile: u32, hitscan: u32) -> AttackType {
    let counts = [melee, projectile, hitscan];
    let mut best = 0;
    for idx in 1..counts.len() {
        if counts[idx] > counts[best] {
            best = idx;
        }
    }
    AttackType::TIE_BREAK_ORDER[best]
}

/// Groups primary-hero rows by (match_uid, is_win), sorted by match then
/// losing side first.
pub fn aggregate_teams(rows: &[HeroStatRow]) -> Vec<TeamAggregate> {
    let mut groups: BTreeMap<(String, bool), TeamAccumulator> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.session.match_uid.clone(), row.session.is_win))
            .or_default()
            .add(row);
    }
    groups
        .into_iter()
        .map(|((match_uid, is_win), acc)| acc.finish(match_uid, is_win))
        .collect()
}

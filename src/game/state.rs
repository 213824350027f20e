//! Combatant and projectile records held in reactive containers

use serde::Serialize;

use super::reactive::{Model, Reactive, StateError};

pub const STARTING_HEALTH: u32 = 10;

/// Combatant record (authoritative)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombatantState {
    pub name: String,
    pub character: String,
    /// Carried for roster data only, nothing reads it
    pub is_comp: bool,
    pub health: u32,

    pub is_directed_right: bool,
    pub is_jumping: bool,
    pub is_landing: bool,
    pub is_kicking: bool,
    pub is_kicked: bool,
    pub is_throwing: bool,
    pub is_thrown: bool,
}

impl CombatantState {
    pub fn new(name: impl Into<String>, character: impl Into<String>, directed_right: bool) -> Self {
        Self {
            name: name.into(),
            character: character.into(),
            is_comp: false,
            health: STARTING_HEALTH,
            is_directed_right: directed_right,
            is_jumping: false,
            is_landing: false,
            is_kicking: false,
            is_kicked: false,
            is_throwing: false,
            is_thrown: false,
        }
    }

    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::DirectedRight => self.is_directed_right,
            Flag::Jumping => self.is_jumping,
            Flag::Landing => self.is_landing,
            Flag::Kicking => self.is_kicking,
            Flag::Kicked => self.is_kicked,
            Flag::Throwing => self.is_throwing,
            Flag::Thrown => self.is_thrown,
        }
    }

    fn flag_mut(&mut self, flag: Flag) -> &mut bool {
        match flag {
            Flag::DirectedRight => &mut self.is_directed_right,
            Flag::Jumping => &mut self.is_jumping,
            Flag::Landing => &mut self.is_landing,
            Flag::Kicking => &mut self.is_kicking,
            Flag::Kicked => &mut self.is_kicked,
            Flag::Throwing => &mut self.is_throwing,
            Flag::Thrown => &mut self.is_thrown,
        }
    }

    /// Jumping or landing
    pub fn is_airborne(&self) -> bool {
        self.is_jumping || self.is_landing
    }

    /// Any state that rules out starting or receiving a throw
    pub fn is_engaged(&self) -> bool {
        self.is_airborne() || self.is_throwing || self.is_thrown
    }
}

/// Boolean fields of [`CombatantState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    DirectedRight,
    Jumping,
    Landing,
    Kicking,
    Kicked,
    Throwing,
    Thrown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombatantField {
    Name,
    Character,
    Health,
    Flag(Flag),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombatantValue {
    Text(String),
    Health(u32),
    Flag(bool),
}

impl Model for CombatantState {
    type Field = CombatantField;
    type Value = CombatantValue;

    fn get(&self, field: CombatantField) -> CombatantValue {
        match field {
            CombatantField::Name => CombatantValue::Text(self.name.clone()),
            CombatantField::Character => CombatantValue::Text(self.character.clone()),
            CombatantField::Health => CombatantValue::Health(self.health),
            CombatantField::Flag(flag) => CombatantValue::Flag(self.flag(flag)),
        }
    }

    fn set(&mut self, field: CombatantField, value: CombatantValue) -> bool {
        match (field, value) {
            (CombatantField::Name, CombatantValue::Text(name)) => self.name = name,
            (CombatantField::Character, CombatantValue::Text(character)) => {
                self.character = character
            }
            (CombatantField::Health, CombatantValue::Health(health)) => self.health = health,
            (CombatantField::Flag(flag), CombatantValue::Flag(on)) => *self.flag_mut(flag) = on,
            _ => return false,
        }
        true
    }
}

impl Reactive<CombatantState> {
    pub fn flag(&self, flag: Flag) -> bool {
        self.read(|state| state.flag(flag))
    }

    pub fn set_flag(&self, flag: Flag, on: bool) -> Result<(), StateError> {
        self.set_field(CombatantField::Flag(flag), CombatantValue::Flag(on))
    }

    pub fn health(&self) -> u32 {
        self.read(|state| state.health)
    }

    pub fn set_health(&self, health: u32) -> Result<(), StateError> {
        self.set_field(CombatantField::Health, CombatantValue::Health(health))
    }

    pub fn name(&self) -> String {
        self.read(|state| state.name.clone())
    }
}

/// Projectile record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProjectileState {
    pub is_directed_right: bool,
    pub alive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectileField {
    DirectedRight,
    Alive,
}

impl Model for ProjectileState {
    type Field = ProjectileField;
    type Value = bool;

    fn get(&self, field: ProjectileField) -> bool {
        match field {
            ProjectileField::DirectedRight => self.is_directed_right,
            ProjectileField::Alive => self.alive,
        }
    }

    fn set(&mut self, field: ProjectileField, value: bool) -> bool {
        match field {
            ProjectileField::DirectedRight => self.is_directed_right = value,
            ProjectileField::Alive => self.alive = value,
        }
        true
    }
}

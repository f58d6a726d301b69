use crate::entities::action::ActionResult;
use crate::entities::item::ItemProps;
use crate::scripting::effects::{EffectArgs, EffectEvaluator};
use crate::world::entity::Entity;
use crate::world::registry::{NetworkId, Registry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    None,
    SelfOnly,
    Enemy,
    Ally,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    None,
    World,
    Battle,
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsableKind {
    Skill,
    Item(ItemProps),
}

fn default_max_level() -> i32 {
    1
}

fn default_target_alive() -> bool {
    true
}

/// Immutable descriptor for anything that can sit on an action bar:
/// an item or a skill. Loaded once from static game data and
/// referenced by id everywhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usable {
    pub id: u32,
    pub name: String,
    pub script: String,
    pub kind: UsableKind,
    #[serde(default = "default_max_level")]
    pub max_level: i32,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub attack_delay: f64,
    #[serde(default)]
    pub attack_time: f64,
    #[serde(default)]
    pub cooldown: f64,
    pub target: TargetType,
    pub scope: Scope,
    #[serde(default = "default_target_alive")]
    pub target_alive: bool,
    #[serde(default)]
    pub price: i64,
}

/// One resolution request flowing through the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct UseRequest {
    pub usable_id: u32,
    pub level: i32,
    pub source: NetworkId,
    pub target: Option<NetworkId>,
    pub scope: Scope,
    /// Set when the action originates from an inventory unlock slot
    /// rather than the action bar; inverts the known-skill check.
    pub from_unlock_slot: bool,
}

impl Usable {
    pub fn is_skill(&self) -> bool {
        matches!(self.kind, UsableKind::Skill)
    }

    pub fn item_props(&self) -> Option<&ItemProps> {
        match &self.kind {
            UsableKind::Item(props) => Some(props),
            UsableKind::Skill => None,
        }
    }

    pub fn is_consumable(&self) -> bool {
        self.item_props().map(|props| props.consumable).unwrap_or(false)
    }

    pub fn max_stack(&self) -> u16 {
        self.item_props().map(|props| props.max_stack).unwrap_or(1)
    }

    pub fn is_tradable(&self) -> bool {
        self.item_props().map(|props| props.tradable).unwrap_or(false)
    }

    pub fn check_scope(&self, scope: Scope) -> bool {
        self.scope != Scope::None && (self.scope == Scope::All || self.scope == scope)
    }

    pub fn can_target_enemy(&self) -> bool {
        matches!(self.target, TargetType::Enemy | TargetType::Any)
    }

    pub fn can_target_ally(&self) -> bool {
        matches!(self.target, TargetType::SelfOnly | TargetType::Ally | TargetType::Any)
    }

    pub fn target_count(&self) -> usize {
        match self.target {
            TargetType::None => 0,
            _ => 1,
        }
    }

    /// Target compatibility: liveness must match the descriptor, and
    /// in battle the side must agree with the target type. Self-only
    /// usables accept nobody but the actor, teammates included.
    pub fn can_target(&self, source: &Entity, target: &Entity) -> bool {
        if self.target == TargetType::SelfOnly && target.id != source.id {
            return false;
        }
        if self.target_alive && !target.is_alive() {
            return false;
        }
        if !self.target_alive && target.is_alive() {
            return false;
        }
        if source.battle.is_some() {
            if source.battle_side == target.battle_side && !self.can_target_ally() {
                return false;
            }
            if source.battle_side != target.battle_side && !self.can_target_enemy() {
                return false;
            }
        }
        true
    }

    /// Ordered eligibility checks. Every failure short-circuits with
    /// no side effect.
    pub fn can_use(
        &self,
        req: &UseRequest,
        registry: &Registry,
        eval: &dyn EffectEvaluator,
    ) -> bool {
        let Some(source) = registry.get(req.source) else {
            return false;
        };
        if !source.is_alive() {
            return false;
        }

        // Unlock semantics come first: a usable reached through an
        // unlock slot is valid exactly when its skill is not yet known.
        match &self.kind {
            UsableKind::Skill => {
                if req.from_unlock_slot {
                    if source.knows_skill(self.id) {
                        return false;
                    }
                } else if !source.knows_skill(self.id) {
                    return false;
                }
            }
            UsableKind::Item(props) => {
                if let Some(skill_id) = props.unlock_skill {
                    if source.knows_skill(skill_id) {
                        return false;
                    }
                }
                if props.consumable || props.key {
                    let held = source
                        .inventory()
                        .map(|inventory| inventory.count_item(self.id))
                        .unwrap_or(0);
                    if held == 0 {
                        return false;
                    }
                }
            }
        }

        if !self.check_scope(req.scope) {
            return false;
        }

        if let Some(target_id) = req.target {
            let Some(target) = registry.get(target_id) else {
                return false;
            };
            if !self.can_target(source, target) {
                return false;
            }
        } else if self.target_count() > 0 {
            return false;
        }

        eval.can_use(&self.script, req.level, source).unwrap_or(true)
    }

    /// The evaluator decides what the action costs; the pipeline adds
    /// the physical inventory decrement for consumables so attributes
    /// and item counts stay consistent.
    pub fn apply_cost(
        &self,
        eval: &dyn EffectEvaluator,
        args: &mut EffectArgs,
        result: &mut ActionResult,
    ) {
        eval.apply_cost(&self.script, args, result);
        if self.is_consumable() {
            result.inventory_cost.push((self.id, 1));
        }
    }

    /// Invokes the effect body. A script without a use function
    /// leaves the result untouched.
    pub fn use_action(
        &self,
        eval: &dyn EffectEvaluator,
        args: &mut EffectArgs,
        result: &mut ActionResult,
    ) {
        eval.use_action(&self.script, args, result);
    }

    /// Script-supplied passive adjustments, applied after the effect
    /// body. Most scripts skip this.
    pub fn stats(
        &self,
        eval: &dyn EffectEvaluator,
        args: &mut EffectArgs,
        result: &mut ActionResult,
    ) {
        eval.stats(&self.script, args, result);
    }

    /// Attack timing, with the evaluator allowed to override the
    /// static defaults. Declining yields the descriptor values.
    pub fn attack_times(&self, eval: &dyn EffectEvaluator, source: &Entity) -> (f64, f64, f64) {
        match eval.attack_times(&self.script, source) {
            Some(times) => times,
            None => (self.attack_delay, self.attack_time, self.cooldown),
        }
    }
}

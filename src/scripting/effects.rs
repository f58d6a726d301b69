use crate::combat::rng::RollStream;
use crate::entities::action::ActionResult;
use crate::entities::attributes::AttributeId;
use crate::world::entity::Entity;

/// Context handed to every effect hook. The roll stream belongs to
/// the enclosing battle (or the world, outside combat), so effect
/// rolls stay on the same deterministic sequence.
pub struct EffectArgs<'a> {
    pub level: i32,
    pub duration: f64,
    pub source: &'a Entity,
    pub target: Option<&'a Entity>,
    pub rng: &'a mut RollStream,
}

/// Behavior seam for usable effects. Every hook is optional: a
/// declined hook (`None` / `false`) means the caller falls back to its
/// default, mirroring a script table without that function.
pub trait EffectEvaluator {
    fn can_use(&self, script: &str, level: i32, source: &Entity) -> Option<bool> {
        let _ = (script, level, source);
        None
    }

    fn apply_cost(&self, script: &str, args: &mut EffectArgs, result: &mut ActionResult) -> bool {
        let _ = (script, args, result);
        false
    }

    fn use_action(&self, script: &str, args: &mut EffectArgs, result: &mut ActionResult) -> bool {
        let _ = (script, args, result);
        false
    }

    /// Passive stat adjustments a script charges its user every turn it
    /// acts, folded in after the effect body.
    fn stats(&self, script: &str, args: &mut EffectArgs, result: &mut ActionResult) -> bool {
        let _ = (script, args, result);
        false
    }

    fn play_sound(&self, script: &str) -> Option<u32> {
        let _ = script;
        None
    }

    fn attack_times(&self, script: &str, source: &Entity) -> Option<(f64, f64, f64)> {
        let _ = (script, source);
        None
    }
}

/// Evaluator that resolves nothing. Useful where an action pipeline
/// is exercised without any effect behavior.
#[derive(Debug, Default)]
pub struct NullEvaluator;

impl EffectEvaluator for NullEvaluator {}

const FIREBALL_MANA_COST: i32 = 15;
const HEAL_MANA_COST: i32 = 10;
const HEAL_PER_LEVEL: i32 = 25;
const HEALTH_POTION_RESTORE: i32 = 50;
const MANA_POTION_RESTORE: i32 = 40;
const CRIT_CHANCE: u32 = 5;

/// Built-in effect bodies, keyed by script name.
#[derive(Debug, Default)]
pub struct EffectTable;

impl EffectTable {
    pub fn new() -> Self {
        Self
    }

    /// Weapon-style damage roll: evasion can void the hit, crits
    /// double it, armor soaks what remains.
    fn roll_damage(args: &mut EffectArgs, result: &mut ActionResult, armor_pierce: bool) {
        let Some(target) = args.target else {
            return;
        };
        let evasion = target.attributes.int(AttributeId::EVASION).clamp(0, 100) as u32;
        if args.rng.roll_percent(evasion) {
            result.target.set_int(AttributeId::MISS, 1);
            return;
        }

        let source = args.source;
        let min = source.attributes.int(AttributeId::MIN_DAMAGE).max(0) as u32;
        let max = source.attributes.int(AttributeId::MAX_DAMAGE).max(0) as u32;
        let mut damage = args.rng.roll_range(min, max) as i32;
        damage = (damage as f32 * source.attributes.get(AttributeId::ATTACK_POWER).as_float().max(1.0))
            as i32;
        if args.rng.roll_percent(CRIT_CHANCE) {
            damage *= 2;
            result.target.set_int(AttributeId::CRIT, 1);
        }
        if !armor_pierce {
            damage -= target.attributes.int(AttributeId::ARMOR).max(0);
        }
        let damage = damage.max(if armor_pierce { 1 } else { 0 });
        result.target.set_int(AttributeId::HEALTH, -damage);
    }
}

impl EffectEvaluator for EffectTable {
    fn can_use(&self, script: &str, level: i32, source: &Entity) -> Option<bool> {
        let _ = level;
        match script {
            "fireball" => Some(source.mana() >= FIREBALL_MANA_COST),
            "heal" => Some(source.mana() >= HEAL_MANA_COST),
            "health_potion" => Some(source.health() < source.max_health()),
            "mana_potion" => {
                Some(source.mana() < source.attributes.int(AttributeId::MAX_MANA))
            }
            _ => None,
        }
    }

    fn apply_cost(&self, script: &str, args: &mut EffectArgs, result: &mut ActionResult) -> bool {
        let _ = args;
        match script {
            "fireball" => {
                result.source.set_int(AttributeId::MANA, -FIREBALL_MANA_COST);
                true
            }
            "heal" => {
                result.source.set_int(AttributeId::MANA, -HEAL_MANA_COST);
                true
            }
            _ => false,
        }
    }

    fn use_action(&self, script: &str, args: &mut EffectArgs, result: &mut ActionResult) -> bool {
        match script {
            "attack" => {
                Self::roll_damage(args, result, false);
                true
            }
            "fireball" => {
                Self::roll_damage(args, result, true);
                true
            }
            "heal" => {
                result
                    .target
                    .set_int(AttributeId::HEALTH, HEAL_PER_LEVEL * args.level.max(1));
                true
            }
            "health_potion" => {
                result.target.set_int(AttributeId::HEALTH, HEALTH_POTION_RESTORE);
                true
            }
            "mana_potion" => {
                result.target.set_int(AttributeId::MANA, MANA_POTION_RESTORE);
                true
            }
            _ => false,
        }
    }

    fn play_sound(&self, script: &str) -> Option<u32> {
        match script {
            "attack" => Some(1),
            "fireball" => Some(2),
            "heal" | "health_potion" | "mana_potion" => Some(3),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::action::Action;
    use crate::entities::usable::Scope;
    use crate::world::registry::NetworkId;

    fn fighter(name: &str, health: i32, mana: i32) -> Entity {
        let mut entity = Entity::player(name, name);
        entity.attributes.set_int(AttributeId::MAX_HEALTH, health);
        entity.attributes.set_int(AttributeId::HEALTH, health);
        entity.attributes.set_int(AttributeId::MAX_MANA, mana);
        entity.attributes.set_int(AttributeId::MANA, mana);
        entity.attributes.set_int(AttributeId::MIN_DAMAGE, 4);
        entity.attributes.set_int(AttributeId::MAX_DAMAGE, 8);
        entity
    }

    #[test]
    fn attack_lands_within_damage_bounds() {
        let table = EffectTable::new();
        let source = fighter("eira", 100, 50);
        let target = fighter("goblin", 30, 0);
        let mut rng = RollStream::from_seed(42);
        let mut result =
            ActionResult::new(Action::new(10, 1), Scope::Battle, NetworkId(1), Some(NetworkId(2)));
        let mut args = EffectArgs {
            level: 1,
            duration: 0.0,
            source: &source,
            target: Some(&target),
            rng: &mut rng,
        };
        assert!(table.use_action("attack", &mut args, &mut result));
        if result.target.get(AttributeId::MISS).is_none() {
            let delta = result
                .target
                .get(AttributeId::HEALTH)
                .expect("damage recorded")
                .as_int();
            assert!((-16..=0).contains(&delta), "unexpected damage {}", delta);
        }
    }

    #[test]
    fn fireball_needs_mana() {
        let table = EffectTable::new();
        let mut source = fighter("eira", 100, 50);
        assert_eq!(table.can_use("fireball", 1, &source), Some(true));
        source.attributes.set_int(AttributeId::MANA, 5);
        assert_eq!(table.can_use("fireball", 1, &source), Some(false));
    }

    #[test]
    fn potion_refused_at_full_health() {
        let table = EffectTable::new();
        let mut source = fighter("eira", 100, 50);
        assert_eq!(table.can_use("health_potion", 1, &source), Some(false));
        source.attributes.set_int(AttributeId::HEALTH, 60);
        assert_eq!(table.can_use("health_potion", 1, &source), Some(true));
    }

    #[test]
    fn unknown_script_declines_every_hook() {
        let table = EffectTable::new();
        let source = fighter("eira", 100, 50);
        assert_eq!(table.can_use("polymorph", 1, &source), None);
        assert_eq!(table.attack_times("polymorph", &source), None);
        assert_eq!(table.play_sound("polymorph"), None);
    }
}

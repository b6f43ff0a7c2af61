use super::*;
use std::fs;

const ARMS: &str = r#"{
    "name": "Arms",
    "universal_slots": {
        "slot_03": { "action": "Overpower", "priority": 60, "key": "3", "conditions": ["target_valid"] },
        "slot_01": { "action": "Mortal Strike", "priority": 80, "min_resource": 30, "key": "1",
                     "conditions": ["target_valid", "in_melee", "off_cooldown"], "follow_up": "slot_03" },
        "slot_02": { "action": "Slam", "priority": 60, "key": "2", "conditions": ["rage_gt_40"] },
        "slot_15": { "action": "Die by the Sword", "priority": 0, "key": "F5", "offensive": false }
    },
    "proc_priority": { "52437": { "slot": "slot_02", "name": "Sudden Death" }, "7384": "slot_03" },
    "logic_overrides": { "panic_threshold": 35, "interrupt_window": [85, 95] },
    "talent_loadouts": { "raid": "abc", "pvp": "def" },
    "hero_talent_latency": { "slot_01": 40 }
}"#;

#[test]
fn slot_id_accepts_common_spellings() {
    assert_eq!(SlotId::parse("slot_07").map(SlotId::get), Ok(7));
    assert_eq!(SlotId::parse("SLOT_07").map(SlotId::get), Ok(7));
    assert_eq!(SlotId::parse("07").map(SlotId::get), Ok(7));
    assert_eq!(SlotId::parse(" 40 ").map(SlotId::get), Ok(40));
    assert!(matches!(SlotId::parse("slot_41"), Err(CoachError::InvalidSlotId { .. })));
    assert!(SlotId::parse("slot_00").is_err());
    assert_eq!(SlotId::new(7).map(|id| id.to_string()), Some("slot_07".to_string()));
}

#[test]
fn slots_sort_by_priority_then_id() -> Result<()> {
    let mut registry = Registry::empty();
    registry.insert_spec_json(Some(71), "arms", ARMS)?;
    let spec = registry.spec(71).ok_or_else(|| anyhow!("spec missing"))?;
    let order: Vec<u8> = spec.slots.iter().map(|slot| slot.id.get()).collect();
    assert_eq!(order, vec![1, 2, 3, 15]);
    assert_eq!(spec.name, "Arms");
    assert_eq!(registry.panic_threshold(71), 35.0);
    assert_eq!(spec.overrides.interrupt_window, (85.0, 95.0));
    assert_eq!(spec.overrides.interrupt_slot.get(), 11);
    assert_eq!(spec.hero_latency_ms(SlotId::parse("slot_01")?), 40);
    Ok(())
}

#[test]
fn proc_priority_accepts_bare_and_named_entries() -> Result<()> {
    let mut registry = Registry::empty();
    registry.insert_spec_json(Some(71), "arms", ARMS)?;
    let spec = registry.spec(71).ok_or_else(|| anyhow!("spec missing"))?;
    let named = &spec.proc_priority[&52437];
    assert_eq!(named.slot.get(), 2);
    assert_eq!(named.name.as_deref(), Some("Sudden Death"));
    assert_eq!(spec.proc_priority[&7384].name, None);
    Ok(())
}

#[test]
fn unknown_guard_fails_the_load() {
    let raw = r#"{ "universal_slots": {
        "slot_01": { "action": "Slam", "priority": 1, "key": "1", "conditions": ["feeling_lucky"] }
    } }"#;
    let err = Registry::empty()
        .insert_spec_json(Some(71), "arms", raw)
        .expect_err("unknown guard must be rejected");
    let coach = err.downcast_ref::<CoachError>();
    assert_eq!(
        coach,
        Some(&CoachError::UnknownGuard {
            slot: "slot_01".to_string(),
            guard: "feeling_lucky".to_string()
        })
    );
}

#[test]
fn dangling_follow_up_fails_the_load() {
    let raw = r#"{ "universal_slots": {
        "slot_01": { "action": "Slam", "priority": 1, "key": "1", "follow_up": "slot_09" }
    } }"#;
    let err = Registry::empty()
        .insert_spec_json(Some(71), "arms", raw)
        .expect_err("dangling follow_up must be rejected");
    assert!(matches!(
        err.downcast_ref::<CoachError>(),
        Some(CoachError::UnknownSlot { .. })
    ));
}

#[test]
fn matchup_rules_put_specific_enemy_before_wildcard() -> Result<()> {
    let mut registry = Registry::empty();
    registry.insert_spec_json(Some(71), "arms", ARMS)?;
    registry.insert_matchups_json(
        71,
        r#"{
            "*": [{ "trigger_kind": "enemy_buff", "trigger_id": 1022, "response_slot": "slot_15" }],
            "62": [{ "trigger_kind": "enemy_cast", "trigger_id": 118, "response_slot": "slot_03",
                     "optional_note": "polymorph" }]
        }"#,
    )?;
    let table = registry.matchups(71).ok_or_else(|| anyhow!("no table"))?;
    let kinds: Vec<TriggerKind> = table.rules_for(62).map(|rule| rule.trigger_kind).collect();
    assert_eq!(kinds, vec![TriggerKind::EnemyCast, TriggerKind::EnemyBuff]);
    assert_eq!(table.rules_for(250).count(), 1);
    assert_eq!(
        table.rules_for(62).next().and_then(|rule| rule.note.as_deref()),
        Some("polymorph")
    );
    Ok(())
}

#[test]
fn matchup_response_slot_must_exist() -> Result<()> {
    let mut registry = Registry::empty();
    registry.insert_spec_json(Some(71), "arms", ARMS)?;
    let result = registry.insert_matchups_json(
        71,
        r#"{ "*": [{ "trigger_kind": "enemy_cast", "trigger_id": 1, "response_slot": "slot_30" }] }"#,
    );
    assert!(result.is_err());
    Ok(())
}

#[test]
fn load_reads_the_data_directory_layout() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    fs::create_dir_all(root.join("specs"))?;
    fs::create_dir_all(root.join("matchups"))?;
    fs::create_dir_all(root.join("config"))?;
    fs::write(root.join("specs/71_arms.json"), ARMS)?;
    fs::write(
        root.join("matchups/71_vs_all.json"),
        r#"{ "*": [{ "trigger_kind": "enemy_buff", "trigger_id": 1022, "response_slot": "slot_15" }] }"#,
    )?;
    fs::write(root.join("config/lethal_spells.json"), r#"[118, { "id": 51514, "name": "Hex" }]"#)?;
    fs::write(
        root.join("config/pve_mechanics.json"),
        r#"{ "stop_attack": [23920], "encounters": { "Fyrakk": { "stop_attack": [419144], "hazard_auras": [420000] } } }"#,
    )?;
    fs::write(
        root.join("config/racials.json"),
        r#"{ "2": { "name": "Blood Fury", "key": "Shift+R", "conditions": ["in_combat"] } }"#,
    )?;

    let registry = Registry::load(root)?;
    assert_eq!(registry.known_spec_ids(), vec![71]);
    assert!(registry.lethal_spells().contains(&51514));
    assert!(registry.stop_attack_ids().contains(&23920));
    assert!(registry.stop_attack_ids().contains(&419144));
    assert!(registry.hazard_auras().contains(&420000));
    let racial = registry.racial(2).ok_or_else(|| anyhow!("racial missing"))?;
    assert_eq!(racial.key, "Shift+R");
    assert_eq!(racial.conditions, vec![Guard::InCombat]);

    let summary = &registry.summaries()[0];
    assert_eq!(summary.slots, 4);
    assert_eq!(summary.matchup_rules, 1);
    assert_eq!(summary.talent_loadouts, 2);
    Ok(())
}

#[test]
fn load_without_specs_is_missing_data() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    fs::create_dir_all(tmp.path().join("specs"))?;
    let err = Registry::load(tmp.path()).expect_err("empty data dir must fail");
    assert!(matches!(
        err.downcast_ref::<CoachError>(),
        Some(CoachError::MissingSpecData { .. })
    ));
    Ok(())
}

#[test]
fn empty_registry_snaps_against_every_playable_spec() {
    assert_eq!(Registry::empty().known_spec_ids().len(), KNOWN_SPEC_IDS.len());
}

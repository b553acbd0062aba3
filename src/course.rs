//! Course materialization.
//!
//! A course element plus one decomposed week run becomes one course
//! document: references resolved through the run's tables, start and end
//! computed from the week-1 anchor and the schedule grid, and the document
//! keyed by a checksum over its own content so re-imports update in place.

use chrono::{Datelike, Duration};
use serde_json::{json, Map, Value};

use crate::checksum::checksum;
use crate::context::{ImportContext, RefCategory};
use crate::graph::{self, GraphBatch};
use crate::weeks::WeekRun;

/// One role-tagged reference inside a course element, with its recurrence
/// mask already parsed.
#[derive(Debug, Clone)]
pub struct PlacementItem {
    pub category: RefCategory,
    pub local_id: String,
    pub mask: u64,
}

const PLACEMENT_ROLES: [(&str, RefCategory); 6] = [
    ("Teacher", RefCategory::Teacher),
    ("Staff", RefCategory::Staff),
    ("Class", RefCategory::Class),
    ("Group", RefCategory::Group),
    ("Room", RefCategory::Room),
    ("Equipment", RefCategory::Equipment),
];

fn parse_mask(value: Option<&Value>) -> Option<u64> {
    value.and_then(Value::as_str).and_then(|s| s.parse().ok())
}

/// Walks the canonicalized course element and collects its placement items.
///
/// With a course-level mask every child inherits the course's `weeks`;
/// otherwise each child carries its own and children without one are not
/// placements (a bare subject reference, for instance).
pub fn collect_items(
    ctx: &mut ImportContext,
    course: &Value,
    course_level_mask: bool,
) -> (Vec<PlacementItem>, Option<u64>) {
    let course_mask = parse_mask(course.get("weeks"));
    let cancel = parse_mask(course.get("cancelWeeks"));
    let mut items = Vec::new();
    for (key, category) in PLACEMENT_ROLES {
        let Some(children) = course.get(key).and_then(Value::as_array) else {
            continue;
        };
        for child in children {
            let Some(local_id) = child.get("id").and_then(Value::as_str) else {
                ctx.report.add_ignored(
                    category.label(),
                    "placement reference without id",
                    child.clone(),
                );
                continue;
            };
            let mask = if course_level_mask {
                course_mask
            } else {
                parse_mask(child.get("weeks"))
            };
            let Some(mask) = mask else { continue };
            items.push(PlacementItem {
                category,
                local_id: local_id.to_string(),
                mask,
            });
        }
    }
    (items, cancel)
}

/// Builds the course document for one week run, or explains why it cannot
/// be built. Callers turn the `Err` into a report error and drop the run.
pub fn build_occurrence(
    ctx: &ImportContext,
    course: &Value,
    items: &[PlacementItem],
    run: &WeekRun,
) -> std::result::Result<Value, String> {
    let day: i64 = course
        .get("day")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .filter(|d| (1..=7).contains(d))
        .ok_or("missing or invalid day")?;
    let start_slot: i64 = course
        .get("startSlot")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or("missing or invalid startSlot")?;
    let slot_count: i64 = course
        .get("slotCount")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or("missing or invalid slotCount")?;

    let subject_local = course
        .get("Subject")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(|s| s.get("id"))
        .and_then(Value::as_str)
        .ok_or("missing subject reference")?;
    let subject_id = ctx
        .resolve(RefCategory::Subject, subject_local)
        .ok_or_else(|| format!("unresolved subject reference: {subject_local}"))?;

    let anchor = ctx.week1_anchor.ok_or("no school year anchor seen")?;
    let slot_duration = ctx
        .slot_duration_minutes
        .ok_or("no schedule grid seen")?;

    let start = anchor
        + Duration::weeks(i64::from(run.start_week) - 1)
        + Duration::days(day - 1)
        + Duration::minutes(start_slot * slot_duration);
    let end = start
        + Duration::weeks(i64::from(run.end_week - run.start_week))
        + Duration::minutes(slot_count * slot_duration);

    let mut teacher_ids = Vec::new();
    let mut staff_ids = Vec::new();
    let mut classes = Vec::new();
    let mut groups = Vec::new();
    let mut room_labels = Vec::new();
    let mut equipment_labels = Vec::new();
    for index in run.active_indices() {
        let item = &items[index];
        let resolved = ctx
            .resolve(item.category, &item.local_id)
            .ok_or_else(|| {
                format!(
                    "unresolved {} reference: {}",
                    item.category.label(),
                    item.local_id
                )
            })?
            .to_string();
        match item.category {
            RefCategory::Teacher => teacher_ids.push(resolved),
            RefCategory::Staff => staff_ids.push(resolved),
            RefCategory::Class => classes.push(ctx.class_name(&resolved)),
            RefCategory::Group => groups.push(resolved),
            RefCategory::Room => room_labels.push(resolved),
            RefCategory::Equipment => equipment_labels.push(resolved),
            RefCategory::Subject => {}
        }
    }

    let mut doc = Map::new();
    doc.insert("unitId".to_string(), json!(ctx.unit_id));
    doc.insert("subjectId".to_string(), json!(subject_id));
    doc.insert("startDate".to_string(), json!(start.to_rfc3339()));
    doc.insert("endDate".to_string(), json!(end.to_rfc3339()));
    doc.insert(
        "dayOfWeek".to_string(),
        json!(start.weekday().number_from_monday()),
    );
    for (field, values) in [
        ("teacherIds", teacher_ids),
        ("staffIds", staff_ids),
        ("classes", classes),
        ("groups", groups),
        ("roomLabels", room_labels),
        ("equipmentLabels", equipment_labels),
    ] {
        // Empty lists are omitted so the checksum does not depend on which
        // roles happen to appear in the export.
        if !values.is_empty() {
            doc.insert(field.to_string(), json!(values));
        }
    }

    let id = checksum(&Value::Object(doc.clone()));
    doc.insert("_id".to_string(), json!(id));
    doc.insert("modified".to_string(), json!(ctx.timestamp));
    Ok(Value::Object(doc))
}

/// Queues the structural side effects of one materialized course: the
/// teacher-teaches-subject links annotated with the course's classes and
/// groups, and time-windowed personnel membership in the functional groups.
pub fn queue_course_links(ctx: &ImportContext, batch: &mut GraphBatch, doc: &Value) {
    let strings = |field: &str| -> Vec<String> {
        doc.get(field)
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };
    let teacher_ids = strings("teacherIds");
    let staff_ids = strings("staffIds");
    let classes = strings("classes");
    let groups = strings("groups");

    if !teacher_ids.is_empty() {
        batch.add(
            graph::LINK_TEACHER_TO_SUBJECT,
            json!({
                "subjectId": doc["subjectId"],
                "teacherIds": teacher_ids,
                "classes": classes,
                "groups": groups,
            }),
        );
    }
    if !groups.is_empty() {
        let group_external_ids: Vec<String> = groups
            .iter()
            .map(|name| ctx.scoped_external_id(name))
            .collect();
        // Membership stays open slightly past the run so a delayed re-import
        // does not cut access mid-day.
        let out_date = ctx.timestamp + 86_400_000;
        for id in teacher_ids.iter().chain(staff_ids.iter()) {
            batch.add(
                graph::PERSONNEL_TO_GROUP,
                json!({
                    "id": id,
                    "groups": group_external_ids,
                    "source": ctx.source,
                    "outDate": out_date,
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weeks::{decompose, mask_from_weeks};
    use chrono::{TimeZone, Utc};

    fn ctx() -> ImportContext {
        let mut ctx = ImportContext::new("0951099D", "DIALECT_A", 1_700_000_000_000);
        ctx.unit_id = "unit-1".to_string();
        ctx.unit_external_id = "unit-ext".to_string();
        // Monday of ISO week 1, offset to 08:00 by the grid.
        ctx.week1_anchor = Some(Utc.with_ymd_and_hms(2023, 9, 4, 8, 0, 0).unwrap());
        ctx.slot_duration_minutes = Some(55);
        ctx.insert(RefCategory::Teacher, "54", "user-54");
        ctx.insert(RefCategory::Class, "53", "4EME B");
        ctx.insert(RefCategory::Room, "56", "B12");
        ctx.insert(RefCategory::Subject, "195", "subject-195");
        ctx
    }

    fn course() -> Value {
        json!({
            "day": "2",
            "startSlot": "4",
            "slotCount": "2",
            "Subject": [{"id": "195"}],
            "Teacher": [{"id": "54", "weeks": mask_from_weeks([2, 3, 4]).to_string()}],
            "Class": [{"id": "53", "weeks": mask_from_weeks([2, 3, 4]).to_string()}],
            "Room": [{"id": "56", "weeks": mask_from_weeks([2, 3, 4]).to_string()}],
        })
    }

    #[test]
    fn one_run_yields_one_occurrence_with_derived_dates() {
        let mut ctx = ctx();
        let course = course();
        let (items, cancel) = collect_items(&mut ctx, &course, false);
        assert_eq!(items.len(), 3);
        let runs = decompose(
            &items.iter().map(|i| i.mask).collect::<Vec<_>>(),
            cancel,
        );
        assert_eq!(runs.len(), 1);

        let doc = build_occurrence(&ctx, &course, &items, &runs[0]).unwrap();
        // Week 2 Tuesday, 08:00 + 4 slots of 55 minutes.
        assert_eq!(doc["startDate"], json!("2023-09-12T11:40:00+00:00"));
        // Two more weeks, plus two slots.
        assert_eq!(doc["endDate"], json!("2023-09-26T13:30:00+00:00"));
        assert_eq!(doc["dayOfWeek"], json!(2));
        assert_eq!(doc["unitId"], json!("unit-1"));
        assert_eq!(doc["subjectId"], json!("subject-195"));
        assert_eq!(doc["teacherIds"], json!(["user-54"]));
        assert_eq!(doc["classes"], json!(["4EME B"]));
        assert_eq!(doc["roomLabels"], json!(["B12"]));
        assert_eq!(doc["modified"], json!(1_700_000_000_000i64));
        assert!(doc.get("staffIds").is_none());
    }

    #[test]
    fn checksum_ignores_modified_and_is_stable_across_runs() {
        let mut ctx_a = ctx();
        let course = course();
        let (items, cancel) = collect_items(&mut ctx_a, &course, false);
        let runs = decompose(&items.iter().map(|i| i.mask).collect::<Vec<_>>(), cancel);
        let first = build_occurrence(&ctx_a, &course, &items, &runs[0]).unwrap();

        let mut ctx_b = ctx();
        ctx_b.timestamp = 1_800_000_000_000;
        let second = build_occurrence(&ctx_b, &course, &items, &runs[0]).unwrap();

        assert_eq!(first["_id"], second["_id"]);
        assert_ne!(first["modified"], second["modified"]);
    }

    #[test]
    fn unresolved_reference_is_an_error_naming_the_item() {
        let mut ctx = ctx();
        let mut course = course();
        course["Room"][0]["id"] = json!("99");
        let (items, cancel) = collect_items(&mut ctx, &course, false);
        let runs = decompose(&items.iter().map(|i| i.mask).collect::<Vec<_>>(), cancel);

        let err = build_occurrence(&ctx, &course, &items, &runs[0]).unwrap_err();
        assert_eq!(err, "unresolved room reference: 99");
    }

    #[test]
    fn class_name_override_applies_to_materialized_classes() {
        let mut ctx = ctx();
        ctx.class_name_overrides
            .insert("4EME B".to_string(), "4B".to_string());
        let course = course();
        let (items, cancel) = collect_items(&mut ctx, &course, false);
        let runs = decompose(&items.iter().map(|i| i.mask).collect::<Vec<_>>(), cancel);
        let doc = build_occurrence(&ctx, &course, &items, &runs[0]).unwrap();
        assert_eq!(doc["classes"], json!(["4B"]));
    }

    #[test]
    fn course_level_mask_applies_to_every_child() {
        let mut ctx = ctx();
        let course = json!({
            "day": "1",
            "startSlot": "0",
            "slotCount": "1",
            "weeks": mask_from_weeks([5, 6]).to_string(),
            "Subject": [{"id": "195"}],
            "Teacher": [{"id": "54"}],
            "Room": [{"id": "56"}],
        });
        let (items, _) = collect_items(&mut ctx, &course, true);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.mask == mask_from_weeks([5, 6])));
    }

    #[test]
    fn links_are_queued_for_teachers_and_groups() {
        let mut ctx = ctx();
        ctx.insert(RefCategory::Group, "7", "GRP A");
        let mut course = course();
        course["Group"] = json!([{"id": "7", "weeks": mask_from_weeks([2, 3, 4]).to_string()}]);
        let (items, cancel) = collect_items(&mut ctx, &course, false);
        let runs = decompose(&items.iter().map(|i| i.mask).collect::<Vec<_>>(), cancel);
        let doc = build_occurrence(&ctx, &course, &items, &runs[0]).unwrap();

        let mut batch = GraphBatch::new();
        queue_course_links(&ctx, &mut batch, &doc);
        let statements = batch.take();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].params["teacherIds"], json!(["user-54"]));
        assert_eq!(statements[0].params["groups"], json!(["GRP A"]));
        assert_eq!(statements[1].params["groups"], json!(["unit-ext$GRP A"]));
        assert_eq!(
            statements[1].params["outDate"],
            json!(1_700_000_000_000i64 + 86_400_000)
        );
    }
}

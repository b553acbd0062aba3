//! The import pipeline.
//!
//! One call to [`import`] is one run: bootstrap reads, personnel discovery
//! and resolution, reference population, course materialization, one graph
//! batch commit, then the document writes are awaited and the stale-course
//! sweep runs. Phases are plain sequential `async` steps; nothing in a run
//! is shared with any other run.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::assembler::assemble;
use crate::context::{ImportContext, RefCategory};
use crate::coordinator::Coordinator;
use crate::course;
use crate::dialect::{Dialect, DialectSpec, EntityKind};
use crate::documents::DocumentClient;
use crate::error::{ImportError, Result};
use crate::graph::{self, GraphBatch, GraphClient};
use crate::personnel::{PersonnelResolver, Profile};
use crate::report::Report;
use crate::weeks::decompose;

/// Runs one import with the current wall-clock as the run timestamp.
pub async fn import(
    graph_client: Arc<dyn GraphClient>,
    documents: Arc<dyn DocumentClient>,
    dialect: Dialect,
    unit_code: &str,
    payload: &str,
) -> Result<Report> {
    import_at(
        graph_client,
        documents,
        dialect,
        unit_code,
        payload,
        Utc::now().timestamp_millis(),
    )
    .await
}

/// Same as [`import`] with an explicit run timestamp (milliseconds since
/// epoch). The timestamp is written as `modified` on every touched course
/// and defines what the reconciliation sweep considers stale.
pub async fn import_at(
    graph_client: Arc<dyn GraphClient>,
    documents: Arc<dyn DocumentClient>,
    dialect: Dialect,
    unit_code: &str,
    payload: &str,
    timestamp: i64,
) -> Result<Report> {
    let spec = dialect.spec();
    let mut ctx = ImportContext::new(unit_code, spec.source, timestamp);
    let mut resolver = PersonnelResolver::new();

    tracing::info!(unit_code, source = spec.source, "starting timetable import");
    bootstrap(&graph_client, spec, &mut ctx, &mut resolver).await?;

    let entities = collect_entities(payload, spec)?;
    tracing::debug!(entities = entities.len(), "export parsed");

    // Phase 1: personnel discovery over the parsed entities.
    for (kind, entity) in &entities {
        match kind {
            EntityKind::Teacher => resolver.discover(&mut ctx, spec, Profile::Teacher, entity),
            EntityKind::Staff => resolver.discover(&mut ctx, spec, Profile::Staff, entity),
            _ => {}
        }
    }
    // Phase 2: everything referenced must resolve before materialization.
    resolver.commit(&mut ctx, &graph_client).await?;

    apply_calendar(&mut ctx, &entities);

    let mut coordinator = Coordinator::new(
        Arc::clone(&graph_client),
        Arc::clone(&documents),
        &ctx.unit_id,
        timestamp,
    );
    let mut batch = GraphBatch::new();
    let mut seen_classes: HashSet<String> = HashSet::new();
    let mut seen_groups: HashSet<String> = HashSet::new();

    for (kind, entity) in &entities {
        match kind {
            EntityKind::Room => register_label(&mut ctx, RefCategory::Room, entity),
            EntityKind::Equipment => register_label(&mut ctx, RefCategory::Equipment, entity),
            EntityKind::Subject => register_subject(&mut ctx, &mut batch, entity),
            EntityKind::Class => {
                register_class(&mut ctx, &mut batch, &mut seen_classes, entity)
            }
            EntityKind::Group => register_group(&mut ctx, &mut batch, &mut seen_groups, entity),
            EntityKind::Student => register_student(&mut ctx, &mut batch, entity),
            EntityKind::Course => {
                handle_course(&mut ctx, spec, &mut batch, &mut coordinator, entity)
            }
            // Teachers and staff resolved in phase 1/2; calendar and grid
            // entities consumed by apply_calendar.
            EntityKind::Teacher
            | EntityKind::Staff
            | EntityKind::SchoolYear
            | EntityKind::ScheduleGrid => {}
        }
    }

    coordinator.commit_graph(batch).await?;
    coordinator.finish().await?;

    tracing::info!(
        ignored = ctx.report.ignored.len(),
        errors = ctx.report.errors.len(),
        "import finished"
    );
    Ok(ctx.report)
}

/// One read batch: the unit itself (with its source-tag check), known
/// personnel mappings, class-name overrides, and subject mappings.
async fn bootstrap(
    graph_client: &Arc<dyn GraphClient>,
    spec: &DialectSpec,
    ctx: &mut ImportContext,
    resolver: &mut PersonnelResolver,
) -> Result<()> {
    let mut batch = GraphBatch::new();
    batch.add(graph::UNIT_BY_CODE, json!({"code": ctx.unit_code}));
    batch.add(
        graph::TEACHERS_BY_PROFILE,
        json!({
            "code": ctx.unit_code,
            "profile": Profile::Teacher.label(),
            "matchAttribute": spec.graph_match_attribute,
        }),
    );
    batch.add(graph::CLASS_NAME_OVERRIDES, json!({"code": ctx.unit_code}));
    batch.add(graph::SUBJECT_MAPPINGS, json!({"code": ctx.unit_code}));

    let results = graph_client
        .commit(batch.take())
        .await
        .map_err(|e| ImportError::Graph(e.message))?;

    let unit = results
        .first()
        .and_then(|rows| rows.first())
        .ok_or_else(|| ImportError::UnknownUnit(ctx.unit_code.clone()))?;
    let actual_source = unit
        .get("timetable")
        .and_then(Value::as_str)
        .map(str::to_string);
    if actual_source.as_deref() != Some(spec.source) {
        return Err(ImportError::SourceMismatch {
            unit: ctx.unit_code.clone(),
            expected: spec.source.to_string(),
            actual: actual_source,
        });
    }
    ctx.unit_id = unit
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    ctx.unit_external_id = unit
        .get("externalId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if let Some(rows) = results.get(1) {
        for row in rows {
            if let (Some(value), Some(id)) = (
                row.get("matchValue").and_then(Value::as_str),
                row.get("id").and_then(Value::as_str),
            ) {
                resolver.seed_mapping(value, id);
            }
        }
    }
    if let Some(rows) = results.get(2) {
        for row in rows {
            let mapping = row
                .get("cm")
                .and_then(|cm| cm.get("mapping"))
                .and_then(Value::as_object);
            if let Some(mapping) = mapping {
                for (vendor, mapped) in mapping {
                    if let Some(mapped) = mapped.as_str() {
                        ctx.class_name_overrides
                            .insert(vendor.clone(), mapped.to_string());
                    }
                }
            }
        }
    }
    if let Some(rows) = results.get(3) {
        for row in rows {
            if let (Some(code), Some(id)) = (
                row.get("code").and_then(Value::as_str),
                row.get("id").and_then(Value::as_str),
            ) {
                ctx.subject_codes.insert(code.to_string(), id.to_string());
            }
        }
    }
    Ok(())
}

/// Parses the payload once into canonicalized entities, in document order.
fn collect_entities(payload: &str, spec: &DialectSpec) -> Result<Vec<(EntityKind, Value)>> {
    let recognized = spec.recognized_tags();
    let mut entities = Vec::new();
    assemble(payload, &recognized, |(tag, record)| {
        if let Some(canonical) = spec.canonicalize(&tag, &record) {
            entities.push(canonical);
        }
        Ok(())
    })?;
    Ok(entities)
}

/// Folds school-year and schedule-grid entities into the run's anchors:
/// the week-1 Monday, offset by the slot-0 start-of-day time, the slot
/// duration, and the end-of-year bound for membership windows.
fn apply_calendar(ctx: &mut ImportContext, entities: &[(EntityKind, Value)]) {
    let mut anchor_date: Option<NaiveDate> = None;
    let mut slot0_time: Option<NaiveTime> = None;

    let parse_date = |v: &Value| -> Option<NaiveDate> {
        v.as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    };
    let parse_time = |v: &Value| -> Option<NaiveTime> {
        v.as_str().and_then(|s| {
            NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .ok()
        })
    };

    for (kind, entity) in entities {
        match kind {
            EntityKind::SchoolYear => {
                match entity.get("firstWeekDate").and_then(|v| parse_date(v)) {
                    Some(date) => anchor_date = Some(date),
                    None => ctx.report.add_ignored(
                        "SchoolYear",
                        "missing or invalid firstWeekDate",
                        entity.clone(),
                    ),
                }
                if let Some(end) = entity.get("endDate").and_then(|v| parse_date(v)) {
                    ctx.year_end = Some(Utc.from_utc_datetime(&end.and_time(NaiveTime::MIN)));
                }
            }
            EntityKind::ScheduleGrid => {
                if let Some(minutes) = entity
                    .get("slotDuration")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<i64>().ok())
                {
                    ctx.slot_duration_minutes = Some(minutes);
                }
                // The slot-0 start time may sit on the entity itself or on
                // nested slot children, depending on the export shape.
                let own = (entity.get("number"), entity.get("startTime"));
                if let (Some(number), Some(start)) = own {
                    if number.as_str() == Some("0") {
                        slot0_time = parse_time(start).or(slot0_time);
                    }
                }
                if let Some(slots) = entity.get("Slot").and_then(Value::as_array) {
                    for slot in slots {
                        if slot.get("number").and_then(Value::as_str) == Some("0") {
                            if let Some(t) = slot.get("startTime").and_then(|v| parse_time(v)) {
                                slot0_time = Some(t);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(date) = anchor_date {
        let time = slot0_time.unwrap_or(NaiveTime::MIN);
        ctx.week1_anchor = Some(Utc.from_utc_datetime(&date.and_time(time)));
    }
}

/// Rooms and equipment resolve to display labels.
fn register_label(ctx: &mut ImportContext, category: RefCategory, entity: &Value) {
    let Some(id) = entity.get("id").and_then(Value::as_str) else {
        ctx.report
            .add_ignored(category.label(), "missing id", entity.clone());
        return;
    };
    let label = entity.get("name").and_then(Value::as_str).unwrap_or(id);
    ctx.insert(category, id, label);
}

/// Subjects resolve to graph ids. A code already mapped on the unit reuses
/// the existing node; anything else is merged in by scoped external id.
fn register_subject(ctx: &mut ImportContext, batch: &mut GraphBatch, entity: &Value) {
    let Some(id) = entity.get("id").and_then(Value::as_str).map(str::to_string) else {
        ctx.report
            .add_ignored("Subject", "missing id", entity.clone());
        return;
    };
    let code = entity
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or(&id)
        .to_string();
    if let Some(existing) = ctx.subject_codes.get(&code) {
        let existing = existing.clone();
        ctx.insert(RefCategory::Subject, &id, &existing);
        return;
    }
    let graph_id = Uuid::new_v4().to_string();
    let label = entity.get("label").and_then(Value::as_str).unwrap_or(&code);
    batch.add(
        graph::CREATE_SUBJECT,
        json!({
            "unitExternalId": ctx.unit_external_id,
            "externalId": ctx.scoped_external_id(&code),
            "code": code,
            "label": label,
            "id": graph_id,
        }),
    );
    ctx.insert(RefCategory::Subject, &id, &graph_id);
    ctx.subject_codes.insert(code, graph_id);
}

/// Classes resolve to names. Names with no matching class node get recorded
/// on the unit's mapping node so an operator can map them later.
fn register_class(
    ctx: &mut ImportContext,
    batch: &mut GraphBatch,
    seen: &mut HashSet<String>,
    entity: &Value,
) {
    let Some(id) = entity.get("id").and_then(Value::as_str) else {
        ctx.report.add_ignored("Class", "missing id", entity.clone());
        return;
    };
    let Some(name) = entity.get("name").and_then(Value::as_str) else {
        ctx.report
            .add_ignored("Class", "missing name", entity.clone());
        return;
    };
    ctx.insert(RefCategory::Class, id, name);
    let mapped = ctx.class_name(name);
    if seen.insert(mapped.clone()) {
        batch.add(
            graph::REGISTER_UNKNOWN_CLASS,
            json!({"code": ctx.unit_code, "className": mapped}),
        );
    }
}

/// Groups resolve to names and are merged into the graph as functional
/// groups attached to the unit.
fn register_group(
    ctx: &mut ImportContext,
    batch: &mut GraphBatch,
    seen: &mut HashSet<String>,
    entity: &Value,
) {
    let Some(id) = entity.get("id").and_then(Value::as_str) else {
        ctx.report.add_ignored("Group", "missing id", entity.clone());
        return;
    };
    let Some(name) = entity.get("name").and_then(Value::as_str) else {
        ctx.report
            .add_ignored("Group", "missing name", entity.clone());
        return;
    };
    ctx.insert(RefCategory::Group, id, name);
    if seen.insert(name.to_string()) {
        batch.add(
            graph::CREATE_GROUP,
            json!({
                "unitExternalId": ctx.unit_external_id,
                "externalId": ctx.scoped_external_id(name),
                "name": name,
                "id": Uuid::new_v4().to_string(),
            }),
        );
    }
}

/// Dialect B carries group membership on student elements; it becomes a
/// time-windowed IN edge bounded by the school year end.
fn register_student(ctx: &mut ImportContext, batch: &mut GraphBatch, entity: &Value) {
    let Some(external_ref) = entity.get("externalRef").and_then(Value::as_str) else {
        // Dialect A lists students without memberships; nothing to do.
        return;
    };
    let Some(group) = entity.get("group").and_then(Value::as_str) else {
        return;
    };
    let Some(year_end) = ctx.year_end else {
        ctx.report.add_ignored(
            "Student",
            "group membership without a school year end date",
            entity.clone(),
        );
        return;
    };
    batch.add(
        graph::STUDENT_TO_GROUP,
        json!({
            "studentExternalId": external_ref,
            "externalId": ctx.scoped_external_id(group),
            "source": ctx.source,
            "inDate": ctx.timestamp,
            "outDate": year_end.timestamp_millis(),
        }),
    );
}

/// Decomposes one course element into week runs and materializes each run.
/// A run that cannot be built is dropped with an error; the rest of the
/// course (and the import) continues.
fn handle_course(
    ctx: &mut ImportContext,
    spec: &DialectSpec,
    batch: &mut GraphBatch,
    coordinator: &mut Coordinator,
    entity: &Value,
) {
    let (items, cancel) = course::collect_items(ctx, entity, spec.course_level_mask);
    if items.is_empty() {
        ctx.report
            .add_ignored("Course", "no placement items with recurrence", entity.clone());
        return;
    }
    let masks: Vec<u64> = items.iter().map(|i| i.mask).collect();
    for run in decompose(&masks, cancel) {
        match course::build_occurrence(ctx, entity, &items, &run) {
            Ok(doc) => {
                course::queue_course_links(ctx, batch, &doc);
                coordinator.queue_course(doc);
            }
            Err(reason) => {
                ctx.report.add_error(format!(
                    "course dropped (weeks {}..={}): {}",
                    run.start_week, run.end_week, reason
                ));
            }
        }
    }
}

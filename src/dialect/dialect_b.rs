//! Dialect B: the calendar export.
//!
//! Lowercase abbreviated vocabulary, one `weeks` mask on the lesson element
//! itself (applying to every referenced entity), teachers matched by an
//! `externalRef` carried over from the organizational registry (already an
//! external id in the graph's value space, so never unit-prefixed), and pupil
//! elements carrying group membership the import turns into time-windowed
//! edges.

use super::{DialectSpec, ElementSpec, EntityKind};

pub static SPEC: DialectSpec = DialectSpec {
    source: "DIALECT_B",
    teacher_id_attribute: Some("externalRef"),
    scoped_personnel_ids: false,
    graph_match_attribute: "externalId",
    course_level_mask: true,
    elements: &[
        ElementSpec {
            tag: "calendar",
            canon: "SchoolYear",
            kind: EntityKind::SchoolYear,
            fields: &[("weekOneStart", "firstWeekDate"), ("pupilsEnd", "endDate")],
        },
        ElementSpec {
            tag: "timegrid",
            canon: "ScheduleGrid",
            kind: EntityKind::ScheduleGrid,
            fields: &[("span", "slotDuration")],
        },
        ElementSpec {
            tag: "cell",
            canon: "Slot",
            kind: EntityKind::ScheduleGrid,
            fields: &[("n", "number"), ("begins", "startTime")],
        },
        ElementSpec {
            tag: "venue",
            canon: "Room",
            kind: EntityKind::Room,
            fields: &[("code", "id"), ("label", "name")],
        },
        ElementSpec {
            tag: "gear",
            canon: "Equipment",
            kind: EntityKind::Equipment,
            fields: &[("code", "id"), ("label", "name")],
        },
        ElementSpec {
            tag: "topic",
            canon: "Subject",
            kind: EntityKind::Subject,
            fields: &[("code", "id"), ("label", "label")],
        },
        ElementSpec {
            tag: "division",
            canon: "Class",
            kind: EntityKind::Class,
            fields: &[("code", "id"), ("label", "name")],
        },
        ElementSpec {
            tag: "squad",
            canon: "Group",
            kind: EntityKind::Group,
            fields: &[("code", "id"), ("label", "name")],
        },
        ElementSpec {
            tag: "tutor",
            canon: "Teacher",
            kind: EntityKind::Teacher,
            fields: &[
                ("code", "id"),
                ("ref", "externalRef"),
                ("first", "firstName"),
                ("last", "lastName"),
                ("born", "birthDate"),
            ],
        },
        ElementSpec {
            tag: "aide",
            canon: "Staff",
            kind: EntityKind::Staff,
            fields: &[("code", "id"), ("first", "firstName"), ("last", "lastName")],
        },
        ElementSpec {
            tag: "pupil",
            canon: "Student",
            kind: EntityKind::Student,
            fields: &[("ref", "externalRef"), ("squad", "group"), ("division", "class")],
        },
        ElementSpec {
            tag: "lesson",
            canon: "Course",
            kind: EntityKind::Course,
            fields: &[
                ("day", "day"),
                ("slot", "startSlot"),
                ("span", "slotCount"),
                ("weeks", "weeks"),
                ("cancelled", "cancelWeeks"),
            ],
        },
    ],
};

//! Field tables for the resource families converge manages.
//!
//! Identity fields pair desired sub-resources with observed ones; everything
//! else is payload. A node pool is identified by its plan `type` only, so a
//! change of `count` resizes the pool in place instead of replacing it.

use crate::schema::{FieldKind, FieldSpec, ResourceSchema, SlotPolicy};

use FieldKind::{Boolean, Integer, List, Object, String as Str};

pub static LKE_CLUSTER: ResourceSchema = ResourceSchema {
    kind: "lke_cluster",
    fields: &[
        FieldSpec::new("label", Str).mutable(),
        FieldSpec::new("region", Str),
        FieldSpec::new("k8s_version", Str).mutable(),
        FieldSpec::new("tags", List).mutable(),
        FieldSpec::new("control_plane", Object).mutable(),
    ],
    slots: SlotPolicy::Independent,
    children: &["lke_node_pool"],
};

pub static LKE_NODE_POOL: ResourceSchema = ResourceSchema {
    kind: "lke_node_pool",
    fields: &[
        FieldSpec::new("type", Str).identity(),
        FieldSpec::new("count", Integer).mutable(),
        FieldSpec::new("autoscaler", Object).mutable(),
        FieldSpec::new("tags", List).mutable(),
    ],
    slots: SlotPolicy::Independent,
    children: &[],
};

pub static FIREWALL: ResourceSchema = ResourceSchema {
    kind: "firewall",
    fields: &[
        FieldSpec::new("label", Str).mutable(),
        FieldSpec::new("status", Str).mutable(),
        FieldSpec::new("tags", List).mutable(),
    ],
    slots: SlotPolicy::Independent,
    children: &["firewall_rule"],
};

pub static FIREWALL_RULE: ResourceSchema = ResourceSchema {
    kind: "firewall_rule",
    fields: &[
        FieldSpec::new("label", Str).identity(),
        FieldSpec::new("direction", Str).mutable(),
        FieldSpec::new("action", Str).mutable(),
        FieldSpec::new("protocol", Str).mutable(),
        FieldSpec::new("ports", Str).mutable().nullable(),
        FieldSpec::new("addresses", Object).mutable(),
        FieldSpec::new("description", Str).mutable().nullable(),
    ],
    slots: SlotPolicy::SharedSlot(&["label"]),
    children: &[],
};

pub static INSTANCE: ResourceSchema = ResourceSchema {
    kind: "instance",
    fields: &[
        FieldSpec::new("label", Str).mutable(),
        FieldSpec::new("region", Str),
        FieldSpec::new("type", Str),
        FieldSpec::new("image", Str),
        FieldSpec::new("tags", List).mutable(),
        FieldSpec::new("group", Str).mutable().nullable(),
    ],
    slots: SlotPolicy::Independent,
    children: &["instance_interface"],
};

pub static INSTANCE_INTERFACE: ResourceSchema = ResourceSchema {
    kind: "instance_interface",
    fields: &[
        FieldSpec::new("purpose", Str).identity(),
        FieldSpec::new("label", Str).identity().nullable(),
        FieldSpec::new("ipam_address", Str).mutable().nullable(),
        FieldSpec::new("primary", Boolean).mutable(),
    ],
    slots: SlotPolicy::SharedSlot(&["purpose"]),
    children: &[],
};

pub static NODEBALANCER: ResourceSchema = ResourceSchema {
    kind: "nodebalancer",
    fields: &[
        FieldSpec::new("label", Str).mutable(),
        FieldSpec::new("region", Str),
        FieldSpec::new("client_conn_throttle", Integer).mutable(),
        FieldSpec::new("tags", List).mutable(),
    ],
    slots: SlotPolicy::Independent,
    children: &["nodebalancer_node"],
};

pub static NODEBALANCER_NODE: ResourceSchema = ResourceSchema {
    kind: "nodebalancer_node",
    fields: &[
        FieldSpec::new("label", Str).identity(),
        FieldSpec::new("address", Str).mutable(),
        FieldSpec::new("weight", Integer).mutable(),
        FieldSpec::new("mode", Str).mutable(),
    ],
    slots: SlotPolicy::SharedSlot(&["address"]),
    children: &[],
};

static ALL: [&ResourceSchema; 8] = [
    &LKE_CLUSTER,
    &LKE_NODE_POOL,
    &FIREWALL,
    &FIREWALL_RULE,
    &INSTANCE,
    &INSTANCE_INTERFACE,
    &NODEBALANCER,
    &NODEBALANCER_NODE,
];

/// Look up a schema by resource kind.
pub fn schema(kind: &str) -> Option<&'static ResourceSchema> {
    ALL.iter().copied().find(|s| s.kind == kind)
}

/// Every known schema, parents before their children.
pub fn all() -> &'static [&'static ResourceSchema] {
    &ALL
}

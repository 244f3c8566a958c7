//! Rows of the controller-side tables this crate reads and writes.
//!
//! The resource family records live in [`crate::domain::resource`]; the rows
//! here belong to tables shared with the rest of the controller.

use diesel::prelude::*;

use super::schema::{controller, domain, genesis_storage, sub_domain, vtap};

/// Ownership row tying an agent to the controller node receiving its data.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = genesis_storage)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GenesisStorageRow {
    pub vtap_id: i32,
    pub node_ip: String,
}

/// Registered agent.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = vtap)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct VtapRow {
    pub id: i32,
    pub name: String,
}

/// Deployment-level resource grouping.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = domain)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DomainRow {
    pub lcuuid: String,
    pub name: String,
    pub domain_type: i32,
    pub cluster_id: String,
    pub controller_ip: String,
}

/// Sub-grouping attached to a domain.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = sub_domain)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SubDomainRow {
    pub lcuuid: String,
    pub domain: String,
    pub cluster_id: String,
}

/// Peer controller node.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = controller)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ControllerRow {
    pub ip: String,
    pub pod_ip: String,
    pub state: i32,
}

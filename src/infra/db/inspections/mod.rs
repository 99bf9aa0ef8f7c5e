mod read;
mod types;
mod write;

use sqlx::{QueryBuilder, Sqlite};

use crate::application::repos::{InspectionQueryFilter, InspectionSortField};

use super::SqliteRepositories;
use super::util::to_millis;

/// Statuses that still count as work in progress for overdue checks.
const OPEN_STATUSES: &str = "('draft', 'in_progress', 'changes_requested')";

/// Make user text match literally inside a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl SqliteRepositories {
    fn apply_inspection_filter<'q>(
        qb: &mut QueryBuilder<'q, Sqlite>,
        filter: &'q InspectionQueryFilter,
    ) {
        if !filter.statuses.is_empty() {
            qb.push(" AND i.status IN (");
            let mut separated = qb.separated(", ");
            for status in &filter.statuses {
                separated.push_bind(*status);
            }
            separated.push_unseparated(")");
        }

        if let Some(result) = filter.result {
            qb.push(" AND i.result = ");
            qb.push_bind(result);
        }

        for (column, value) in [
            ("i.site_id", filter.site_id),
            ("i.asset_id", filter.asset_id),
            ("i.location_id", filter.location_id),
            ("i.template_id", filter.template_id),
            ("i.inspector_id", filter.inspector_id),
        ] {
            if let Some(value) = value {
                qb.push(format!(" AND {column} = "));
                qb.push_bind(value);
            }
        }

        if let Some(from) = filter.inspection_date_from {
            qb.push(" AND i.inspection_date >= ");
            qb.push_bind(to_millis(from));
        }
        if let Some(to) = filter.inspection_date_to {
            qb.push(" AND i.inspection_date <= ");
            qb.push_bind(to_millis(to));
        }

        if let Some(now) = filter.overdue_at {
            qb.push(format!(
                " AND i.status IN {OPEN_STATUSES} AND i.due_date IS NOT NULL AND i.due_date < "
            ));
            qb.push_bind(to_millis(now));
        }

        match filter.has_defects {
            Some(true) => {
                qb.push(" AND i.defect_count > 0");
            }
            Some(false) => {
                qb.push(" AND i.defect_count = 0");
            }
            None => {}
        }

        if let Some(status) = filter.sync_status {
            qb.push(" AND i.sync_status = ");
            qb.push_bind(status);
        }

        if let Some(needs_review) = filter.needs_review {
            qb.push(" AND i.needs_review = ");
            qb.push_bind(needs_review);
        }

        if filter.compliance_only {
            qb.push(" AND i.compliance_tag IS NOT NULL");
        }

        if let Some(search) = filter.search.as_ref() {
            let pattern = format!("%{}%", escape_like(search.trim()));
            qb.push(" AND (i.code LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR i.template_name LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR i.notes LIKE ");
            qb.push_bind(pattern);
            qb.push(" ESCAPE '\\')");
        }
    }

    fn push_inspection_order(qb: &mut QueryBuilder<'_, Sqlite>, filter: &InspectionQueryFilter) {
        let Some(sort) = filter.sort else {
            qb.push(" ORDER BY i.created_at DESC, i.code_number DESC");
            return;
        };
        let column = match sort.field {
            InspectionSortField::InspectionDate => "i.inspection_date",
            InspectionSortField::DueDate => "i.due_date",
            InspectionSortField::CreatedAt => "i.created_at",
            InspectionSortField::UpdatedAt => "i.updated_at",
            InspectionSortField::Code => "i.code_number",
        };
        let direction = if sort.descending { "DESC" } else { "ASC" };
        qb.push(format!(" ORDER BY {column} {direction}, i.code_number {direction}"));
    }
}

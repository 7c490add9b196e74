use sqlx::PgPool;

use crate::auth::session::Permissions;

/// The three document groups of an academic record. Discriminated at compile
/// time; the string form only exists at the storage and routing boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Personal,
    Inscription,
    Degree,
}

impl DocKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocKind::Personal => "personal",
            DocKind::Inscription => "inscription",
            DocKind::Degree => "degree",
        }
    }

    pub fn parse(s: &str) -> Option<DocKind> {
        match s {
            "personal" => Some(DocKind::Personal),
            "inscription" => Some(DocKind::Inscription),
            "degree" => Some(DocKind::Degree),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocKind::Personal => "Personal Documents",
            DocKind::Inscription => "Inscription Documents",
            DocKind::Degree => "Degree Documents",
        }
    }

    pub fn all() -> &'static [DocKind] {
        &[DocKind::Personal, DocKind::Inscription, DocKind::Degree]
    }

    /// The named file slots of this group, in display order.
    pub fn slots(&self) -> &'static [SlotSpec] {
        match self {
            DocKind::Personal => PERSONAL_SLOTS,
            DocKind::Inscription => INSCRIPTION_SLOTS,
            DocKind::Degree => DEGREE_SLOTS,
        }
    }

    pub fn slot(&self, name: &str) -> Option<&'static SlotSpec> {
        self.slots().iter().find(|s| s.name == name)
    }
}

/// Review status of a reviewable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocStatus::Pending => "pending",
            DocStatus::Approved => "approved",
            DocStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<DocStatus> {
        match s {
            "pending" => Some(DocStatus::Pending),
            "approved" => Some(DocStatus::Approved),
            "rejected" => Some(DocStatus::Rejected),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocStatus::Pending => "Pending",
            DocStatus::Approved => "Approved",
            DocStatus::Rejected => "Rejected",
        }
    }
}

/// Which reviewer class may decide a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewerKind {
    Staff,
    Language,
}

impl ReviewerKind {
    pub fn permission(&self) -> &'static str {
        match self {
            ReviewerKind::Staff => "documents.review",
            ReviewerKind::Language => "documents.review.language",
        }
    }
}

/// A named file position within a document group.
#[derive(Debug, Clone, Copy)]
pub struct SlotSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub reviewable: bool,
    pub reviewer: ReviewerKind,
}

impl SlotSpec {
    const fn reviewed(name: &'static str, label: &'static str) -> Self {
        SlotSpec { name, label, reviewable: true, reviewer: ReviewerKind::Staff }
    }

    const fn language(name: &'static str, label: &'static str) -> Self {
        SlotSpec { name, label, reviewable: true, reviewer: ReviewerKind::Language }
    }

    const fn plain(name: &'static str, label: &'static str) -> Self {
        SlotSpec { name, label, reviewable: false, reviewer: ReviewerKind::Staff }
    }

    /// Whether the given permission set may decide this slot.
    pub fn can_review(&self, permissions: &Permissions) -> bool {
        self.reviewable && permissions.has(self.reviewer.permission())
    }
}

const PERSONAL_SLOTS: &[SlotSpec] = &[
    SlotSpec::reviewed("birth_certificate", "Birth certificate"),
    SlotSpec::reviewed("identification_card", "Identification card"),
    SlotSpec::plain("photo", "Photograph"),
    SlotSpec::plain("address_proof", "Proof of address"),
];

const INSCRIPTION_SLOTS: &[SlotSpec] = &[
    SlotSpec::reviewed("application_form", "Application form"),
    SlotSpec::reviewed("study_certificate", "Certificate of studies"),
    SlotSpec::reviewed("payment_receipt", "Payment receipt"),
    SlotSpec::plain("health_certificate", "Health certificate"),
];

const DEGREE_SLOTS: &[SlotSpec] = &[
    SlotSpec::language("language_certificate", "Language certificate"),
    SlotSpec::reviewed("social_service_report", "Social service report"),
    SlotSpec::reviewed("thesis", "Thesis"),
];

/// All slot names that belong to the language reviewer, across kinds.
pub fn language_slots() -> Vec<&'static str> {
    DocKind::all()
        .iter()
        .flat_map(|k| k.slots())
        .filter(|s| s.reviewer == ReviewerKind::Language)
        .map(|s| s.name)
        .collect()
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Document {
    pub id: i64,
    pub record_id: i64,
    pub kind: String,
    pub slot: String,
    pub file_path: String,
    pub status: Option<String>,
    pub uploaded_at: String,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<String>,
}

impl Document {
    pub fn status_label(&self) -> &'static str {
        self.status
            .as_deref()
            .and_then(DocStatus::parse)
            .map(|s| s.label())
            .unwrap_or("—")
    }
}

/// One row of the slot table on the record detail / upload pages: the static
/// slot paired with whatever was uploaded into it.
#[derive(Debug, Clone)]
pub struct SlotEntry {
    pub spec: &'static SlotSpec,
    pub document: Option<Document>,
}

impl SlotEntry {
    pub fn has_file(&self) -> bool {
        self.document.is_some()
    }

    pub fn file_name(&self) -> String {
        self.document
            .as_ref()
            .map(|d| {
                d.file_path
                    .rsplit('/')
                    .next()
                    .unwrap_or(d.file_path.as_str())
                    .to_string()
            })
            .unwrap_or_default()
    }

    pub fn status_text(&self) -> String {
        match &self.document {
            None => "Not uploaded".to_string(),
            Some(d) => d.status_label().to_string(),
        }
    }
}

/// Merge the slot catalog of a kind with the stored rows, in catalog order.
/// Rows whose slot no longer exists in the catalog are dropped.
pub fn slot_entries(kind: DocKind, documents: &[Document]) -> Vec<SlotEntry> {
    kind.slots()
        .iter()
        .map(|spec| SlotEntry {
            spec,
            document: documents
                .iter()
                .find(|d| d.kind == kind.as_str() && d.slot == spec.name)
                .cloned(),
        })
        .collect()
}

/// Upload progress of one document group, for the student dashboard.
#[derive(Debug, Clone)]
pub struct KindProgress {
    pub kind: DocKind,
    pub uploaded: usize,
    pub approved: usize,
    pub total: usize,
}

pub fn progress(kind: DocKind, documents: &[Document]) -> KindProgress {
    let entries = slot_entries(kind, documents);
    let uploaded = entries.iter().filter(|e| e.document.is_some()).count();
    let approved = entries
        .iter()
        .filter(|e| {
            e.document
                .as_ref()
                .and_then(|d| d.status.as_deref())
                .and_then(DocStatus::parse)
                == Some(DocStatus::Approved)
        })
        .count();
    KindProgress { kind, uploaded, approved, total: entries.len() }
}

const SELECT_DOCUMENT: &str = "\
    SELECT d.id, d.record_id, d.kind, d.slot, d.file_path, d.status, \
           to_char(d.uploaded_at, 'YYYY-MM-DD HH24:MI') AS uploaded_at, \
           d.reviewed_by, \
           to_char(d.reviewed_at, 'YYYY-MM-DD HH24:MI') AS reviewed_at \
    FROM documents d";

pub async fn find_by_record(pool: &PgPool, record_id: i64) -> Result<Vec<Document>, sqlx::Error> {
    sqlx::query_as::<_, Document>(&format!(
        "{SELECT_DOCUMENT} WHERE d.record_id = $1 ORDER BY d.kind, d.slot"
    ))
    .bind(record_id)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Document>, sqlx::Error> {
    sqlx::query_as::<_, Document>(&format!("{SELECT_DOCUMENT} WHERE d.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Insert or replace the file of a slot. Replacing resets the review state:
/// a reviewable slot goes back to pending, others stay status-less.
pub async fn upsert_slot(
    pool: &PgPool,
    record_id: i64,
    kind: DocKind,
    spec: &SlotSpec,
    file_path: &str,
) -> Result<i64, sqlx::Error> {
    let status = if spec.reviewable { Some(DocStatus::Pending.as_str()) } else { None };
    sqlx::query_scalar(
        "INSERT INTO documents (record_id, kind, slot, file_path, status) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (record_id, kind, slot) DO UPDATE \
         SET file_path = EXCLUDED.file_path, status = EXCLUDED.status, \
             uploaded_at = now(), reviewed_by = NULL, reviewed_at = NULL \
         RETURNING id",
    )
    .bind(record_id)
    .bind(kind.as_str())
    .bind(spec.name)
    .bind(file_path)
    .bind(status)
    .fetch_one(pool)
    .await
}

pub async fn set_status(
    pool: &PgPool,
    id: i64,
    status: DocStatus,
    reviewer_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE documents SET status = $1, reviewed_by = $2, reviewed_at = now() WHERE id = $3",
    )
    .bind(status.as_str())
    .bind(reviewer_id)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM documents WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Reviewer scope over the pending queue, derived from the permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewScope {
    All,
    StaffOnly,
    LanguageOnly,
}

pub fn review_scope(permissions: &Permissions) -> Option<ReviewScope> {
    let staff = permissions.has("documents.review");
    let language = permissions.has("documents.review.language");
    match (staff, language) {
        (true, true) => Some(ReviewScope::All),
        (true, false) => Some(ReviewScope::StaffOnly),
        (false, true) => Some(ReviewScope::LanguageOnly),
        (false, false) => None,
    }
}

/// A pending document enriched with record and student info for the queue.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingDocument {
    pub id: i64,
    pub record_id: i64,
    pub record_code: String,
    pub student_name: String,
    pub kind: String,
    pub slot: String,
    pub uploaded_at: String,
}

impl PendingDocument {
    pub fn slot_label(&self) -> &'static str {
        DocKind::parse(&self.kind)
            .and_then(|k| k.slot(&self.slot))
            .map(|s| s.label)
            .unwrap_or("Unknown")
    }
}

const SELECT_PENDING: &str = "\
    SELECT d.id, d.record_id, r.code AS record_code, \
           u.first_name || ' ' || u.last_name AS student_name, \
           d.kind, d.slot, \
           to_char(d.uploaded_at, 'YYYY-MM-DD HH24:MI') AS uploaded_at \
    FROM documents d \
    JOIN records r ON r.id = d.record_id \
    JOIN users u ON u.id = r.user_id \
    WHERE d.status = 'pending'";

fn scope_clause(scope: ReviewScope) -> &'static str {
    match scope {
        ReviewScope::All => "",
        ReviewScope::StaffOnly => " AND NOT (d.slot = ANY($1))",
        ReviewScope::LanguageOnly => " AND d.slot = ANY($1)",
    }
}

pub async fn find_pending(
    pool: &PgPool,
    scope: ReviewScope,
) -> Result<Vec<PendingDocument>, sqlx::Error> {
    let sql = format!("{SELECT_PENDING}{} ORDER BY d.uploaded_at", scope_clause(scope));
    let query = sqlx::query_as::<_, PendingDocument>(&sql);
    match scope {
        ReviewScope::All => query.fetch_all(pool).await,
        _ => query.bind(language_slots()).fetch_all(pool).await,
    }
}

pub async fn count_pending(pool: &PgPool, scope: ReviewScope) -> Result<i64, sqlx::Error> {
    let sql = format!(
        "SELECT COUNT(*) FROM documents d WHERE d.status = 'pending'{}",
        scope_clause(scope)
    );
    let query = sqlx::query_scalar::<_, i64>(&sql);
    match scope {
        ReviewScope::All => query.fetch_one(pool).await,
        _ => query.bind(language_slots()).fetch_one(pool).await,
    }
}

pub async fn count_by_status(pool: &PgPool, status: DocStatus) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE status = $1")
        .bind(status.as_str())
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(kind: &str, slot: &str, status: Option<&str>) -> Document {
        Document {
            id: 1,
            record_id: 7,
            kind: kind.to_string(),
            slot: slot.to_string(),
            file_path: format!("REC-1/{kind}/{slot}.pdf"),
            status: status.map(String::from),
            uploaded_at: "2026-01-10 09:00".to_string(),
            reviewed_by: None,
            reviewed_at: None,
        }
    }

    #[test]
    fn kind_parse_round_trips() {
        for kind in DocKind::all() {
            assert_eq!(DocKind::parse(kind.as_str()), Some(*kind));
        }
        assert_eq!(DocKind::parse("transcript"), None);
    }

    #[test]
    fn slot_entries_follow_catalog_order() {
        let docs = vec![
            doc("personal", "photo", None),
            doc("personal", "birth_certificate", Some("approved")),
        ];
        let entries = slot_entries(DocKind::Personal, &docs);
        assert_eq!(entries.len(), DocKind::Personal.slots().len());
        assert_eq!(entries[0].spec.name, "birth_certificate");
        assert!(entries[0].document.is_some());
        assert!(entries[1].document.is_none()); // identification_card not uploaded
    }

    #[test]
    fn slot_entries_drop_rows_of_other_kinds() {
        let docs = vec![doc("degree", "thesis", Some("pending"))];
        let entries = slot_entries(DocKind::Personal, &docs);
        assert!(entries.iter().all(|e| e.document.is_none()));
    }

    #[test]
    fn progress_counts_uploaded_and_approved() {
        let docs = vec![
            doc("inscription", "application_form", Some("approved")),
            doc("inscription", "payment_receipt", Some("pending")),
        ];
        let p = progress(DocKind::Inscription, &docs);
        assert_eq!(p.total, 4);
        assert_eq!(p.uploaded, 2);
        assert_eq!(p.approved, 1);
    }

    #[test]
    fn language_certificate_needs_language_permission() {
        use crate::auth::session::Permissions;

        let slot = DocKind::Degree.slot("language_certificate").unwrap();
        let teacher = Permissions::from_csv("documents.view,documents.review");
        let language = Permissions::from_csv("documents.review.language");
        assert!(!slot.can_review(&teacher));
        assert!(slot.can_review(&language));

        let thesis = DocKind::Degree.slot("thesis").unwrap();
        assert!(thesis.can_review(&teacher));
        assert!(!thesis.can_review(&language));
    }

    #[test]
    fn photo_slot_is_not_reviewable() {
        use crate::auth::session::Permissions;

        let slot = DocKind::Personal.slot("photo").unwrap();
        let admin = Permissions::from_csv("documents.review,documents.review.language");
        assert!(!slot.can_review(&admin));
    }

    #[test]
    fn review_scope_from_permissions() {
        use crate::auth::session::Permissions;

        assert_eq!(
            review_scope(&Permissions::from_csv("documents.review")),
            Some(ReviewScope::StaffOnly)
        );
        assert_eq!(
            review_scope(&Permissions::from_csv("documents.review.language")),
            Some(ReviewScope::LanguageOnly)
        );
        assert_eq!(
            review_scope(&Permissions::from_csv("documents.review,documents.review.language")),
            Some(ReviewScope::All)
        );
        assert_eq!(review_scope(&Permissions::from_csv("documents.view")), None);
    }

    #[test]
    fn language_slots_cover_only_language_reviewer() {
        let slots = language_slots();
        assert_eq!(slots, vec!["language_certificate"]);
    }
}

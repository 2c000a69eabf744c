//! Diesel schema for scheduler persistence.

diesel::table! {
    /// Scheduled task records.
    scheduled_tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Display label.
        task_name -> Text,
        /// Ordered workflow steps.
        workflow -> Jsonb,
        /// Discriminated schedule document.
        schedule -> Jsonb,
        /// IANA zone name.
        timezone -> Text,
        /// Whether the task is still evaluated.
        is_active -> Bool,
        /// Last confirmed dispatch instant.
        last_run_at -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Outbound work chains awaiting external executors.
    work_queue (occurrence_id) {
        /// Unique occurrence identifier.
        occurrence_id -> Text,
        /// Task the chain belongs to.
        task_id -> Uuid,
        /// Ordered work items.
        chain -> Jsonb,
        /// Enqueue timestamp.
        enqueued_at -> Timestamptz,
    }
}

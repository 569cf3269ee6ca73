//! Esquema Diesel. Debe coincidir con `migrations/`.

diesel::table! {
    job_specs (id) {
        id -> Text,
        created_at -> Timestamptz,
        document -> Jsonb,
    }
}

diesel::table! {
    job_runs (id) {
        id -> Text,
        job_spec_id -> Text,
        status -> Text,
        trigger_key -> Nullable<Text>,
        created_at -> Timestamptz,
        document -> Jsonb,
    }
}

diesel::table! {
    service_agreements (id) {
        id -> Text,
        job_spec_id -> Text,
        created_at -> Timestamptz,
        document -> Jsonb,
    }
}

diesel::joinable!(job_runs -> job_specs (job_spec_id));
diesel::joinable!(service_agreements -> job_specs (job_spec_id));

diesel::allow_tables_to_appear_in_same_query!(job_specs, job_runs, service_agreements,);

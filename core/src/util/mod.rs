mod id_gen;

pub use id_gen::generate_run_id;

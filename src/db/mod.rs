pub mod agreementdb;
pub mod chainsyncdb;
pub mod db;
pub mod evaluationdb;
pub mod proposaldb;
pub mod userdb;

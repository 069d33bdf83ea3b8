pub mod agreementmodel;
pub mod chainmodel;
pub mod evaluationmodel;
pub mod proposalmodel;
pub mod usermodel;

pub mod workdtos;

pub mod inscription;
pub mod parcoursup;

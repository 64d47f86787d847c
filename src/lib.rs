//! Cryptanalysis toolkit for structure-leaking ciphers, broadcast RSA and
//! interactive discrete-log oracles

pub mod arith;
pub mod broadcast;
pub mod crt;
pub mod dlog;
pub mod language;
pub mod oracle;
pub mod substitution;

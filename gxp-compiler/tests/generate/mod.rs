//! What a build writes for each output language.

use crate::common::{build, fixture_store};
use gxp_compiler::build::{FileStore, MemoryFileStore, SimpleCompilationManager};
use gxp_compiler::lang::OutputLanguage;
use std::path::Path;
use std::sync::Arc;

fn artifact(store: &Arc<MemoryFileStore>, name: &str) -> String {
    store
        .read(Path::new("out/com/example").join(name).as_path())
        .unwrap_or_else(|e| panic!("{name}: {e}"))
}

fn built() -> Arc<MemoryFileStore> {
    let store = fixture_store();
    let (report, alerts) = build(&store, &OutputLanguage::ALL, &mut SimpleCompilationManager);
    assert!(!report.has_errors(), "{alerts:?}");
    store
}

#[test]
fn test_java() {
    let store = built();
    let java = artifact(&store, "Hello.java");
    assert!(java.starts_with("// Generated from src/com/example/Hello.gxp. Do not edit.\n"));
    assert!(java.contains("package com.example;\n"));
    assert!(java.contains(
        "public static void write(Appendable out, GxpContext gxpContext, String user, boolean visible) throws java.io.IOException {"
    ));
    assert!(java.contains("com.example.Card.write(out, gxpContext, \"Welcome\", "));
    assert!(java.contains("public static boolean getDefaultVisible() {"));

    let card = artifact(&store, "Card.java");
    assert!(card.contains("public class Card {"));
}

#[test]
fn test_cpp_header_and_source() {
    let store = built();
    let header = artifact(&store, "Hello.h");
    assert!(header.contains("#ifndef COM_EXAMPLE_HELLO_H__\n#define COM_EXAMPLE_HELLO_H__\n"));
    assert!(header.contains("#include \"com/example/Card.h\"\n"));
    assert!(header.contains("namespace com {\nnamespace example {\n"));

    let source = artifact(&store, "Hello.cc");
    assert!(source.contains("#include \"com/example/Hello.h\"\n"));
    assert!(source.contains("::com::example::Card::Write(out, gxp_context, \"Welcome\", "));
}

#[test]
fn test_javascript() {
    let store = built();
    let js = artifact(&store, "Hello.js");
    assert!(js.contains("goog.provide('com.example.Hello');\n"));
    assert!(js.contains("goog.require('com.example.Card');\n"));
    assert!(js.contains("com.example.Hello.write = function("));
}

#[test]
fn test_xmb_holds_only_translatable_text() {
    let store = built();
    let hello = artifact(&store, "Hello.xmb");
    assert!(hello.contains(">Hello <ph name=\"USER\"><ex>Bob</ex>%1</ph>!</msg>\n"), "{hello}");
    assert_eq!(hello.matches("<msg ").count(), 1);

    // Card's only text sits in a nomsg
    let card = artifact(&store, "Card.xmb");
    assert!(!card.contains("<msg "), "{card}");
}

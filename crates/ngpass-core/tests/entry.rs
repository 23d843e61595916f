//! Bootstrap entry resolution against real Angular-style projects on disk.

use ngpass_core::{resolve_bootstrap_entry, CompilerHost, DiskHost, Error};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const MAIN: &str = "\
import { enableProdMode } from '@angular/core';
import { platformBrowserDynamic } from '@angular/platform-browser-dynamic';
import { AppModule } from './app/app.module';

if (process.env.ENV === 'production') {
  enableProdMode();
}

platformBrowserDynamic().bootstrapModule(AppModule);
";

const APP_MODULE: &str = "\
import { NgModule } from '@angular/core';
import { BrowserModule } from '@angular/platform-browser';
import { AppComponent } from './app.component';

@NgModule({
  imports: [BrowserModule],
  declarations: [AppComponent],
  bootstrap: [AppComponent],
})
export class AppModule {}
";

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

#[test]
fn test_direct_app_module() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "src/main.ts", MAIN);
    write(root, "src/app/app.module.ts", APP_MODULE);
    write(root, "src/app/app.component.ts", "export class AppComponent {}\n");

    let host = DiskHost::new();
    let entry = resolve_bootstrap_entry(&host, &root.join("src/main.ts")).unwrap();
    let src = host.canonical_file_name(&root.join("src"));
    assert_eq!(entry.symbol_name, "AppModule");
    assert_eq!(entry.relative_to(&src), "./app/app.module#AppModule");
    assert_eq!(entry.module_path, src.join("app/app.module"));
}

#[test]
fn test_bootstrap_with_type_arguments() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "src/main.ts",
        &MAIN.replace("bootstrapModule(AppModule)", "bootstrapModule<AppModule>(AppModule)"),
    );
    write(root, "src/app/app.module.ts", APP_MODULE);
    write(root, "src/app/app.component.ts", "export class AppComponent {}\n");

    let host = DiskHost::new();
    let entry = resolve_bootstrap_entry(&host, &root.join("src/main.ts")).unwrap();
    let src = host.canonical_file_name(&root.join("src"));
    assert_eq!(entry.relative_to(&src), "./app/app.module#AppModule");
}

#[test]
fn test_through_directory_index() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "src/main.ts",
        "import { platformBrowserDynamic } from '@angular/platform-browser-dynamic';\nimport { AppModule } from './app';\n\nplatformBrowserDynamic().bootstrapModule(AppModule);\n",
    );
    write(root, "src/app/index.ts", "export * from './app.component';\nexport * from './app.module';\n");
    write(root, "src/app/app.module.ts", APP_MODULE);
    write(root, "src/app/app.component.ts", "export class AppComponent {}\n");

    let host = DiskHost::new();
    let entry = resolve_bootstrap_entry(&host, &root.join("src/main.ts")).unwrap();
    let src = host.canonical_file_name(&root.join("src"));
    assert_eq!(entry.relative_to(&src), "./app/app.module#AppModule");
}

#[test]
fn test_named_reexport_of_a_directory() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "src/main.ts",
        "import { Root } from './barrel';\nplatform.bootstrapModuleFactory(Root);\n",
    );
    write(root, "src/barrel.ts", "export { AppModule as Root } from './app';\n");
    write(root, "src/app/index.ts", "export { AppModule } from './app.module';\n");
    write(root, "src/app/app.module.ts", APP_MODULE);

    let host = DiskHost::new();
    let entry = resolve_bootstrap_entry(&host, &root.join("src/main.ts")).unwrap();
    let src = host.canonical_file_name(&root.join("src"));
    assert_eq!(entry.relative_to(&src), "./app/app.module#AppModule");
}

#[test]
fn test_two_bootstrap_calls() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "src/main.ts",
        "import { A } from './a';\nimport { B } from './b';\nplatform.bootstrapModule(A);\nplatform.bootstrapModule(B);\n",
    );
    write(root, "src/a.ts", "export class A {}\n");
    write(root, "src/b.ts", "export class B {}\n");

    let err = resolve_bootstrap_entry(&DiskHost::new(), &root.join("src/main.ts")).unwrap_err();
    assert!(matches!(err, Error::AmbiguousBootstrap { found: 2, .. }));
    assert!(err.to_string().contains("entryModule"));
}

#[test]
fn test_unresolved_named_import() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "src/main.ts",
        "import { AppModule } from './app/app.module';\nplatform.bootstrapModule(AppModule);\n",
    );
    write(root, "src/app/app.module.ts", "export const AppModule = {};\n");

    let err = resolve_bootstrap_entry(&DiskHost::new(), &root.join("src/main.ts")).unwrap_err();
    match err {
        Error::UnresolvedSymbol { symbol, .. } => assert_eq!(symbol, "AppModule"),
        other => panic!("unexpected error: {other}"),
    }
}

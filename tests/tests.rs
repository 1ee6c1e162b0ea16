use std::path::Path;
use tempfile::TempDir;
use tether::*;

const FOO: &str = r#"
name = "foo"
description = "Scenario package"
version = "1.0.0"
source = "${output}/download"

[[versions]]
range = ">=2.0.0"
extract = "unzip"
"#;

const BAR: &str = r#"
name = "bar"
version = "0.3.0"
source = "https://example.com/bar-${version}-${platform}"
"#;

const NODE: &str = r#"
name = "node"
version = "18.17.0"
source = "https://nodejs.org/dist/v${version}/node-v${version}-${platform}.tar.gz"
extract = "tar -xzf - --strip-components=1 -C ${output}"
bins = { node = "bin/node", npm = "bin/npm" }
"#;

fn setup_tests() -> (TempDir, Context) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let work = root.join("work");
    std::fs::create_dir_all(&work).unwrap();
    let paths = Paths::from_dirs(work, root.join("home"), None, root.join("tmp"));
    let mut settings = Settings::from_files(vec![], &paths).unwrap();
    settings.link_dir = root.join("bin");

    std::fs::create_dir_all(&paths.catalog_dir).unwrap();
    write_manifest(&paths, "foo", FOO);
    write_manifest(&paths, "bar", BAR);
    write_manifest(&paths, "node", NODE);
    (temp_dir, Context::new(paths, settings))
}

fn write_manifest(paths: &Paths, name: &str, content: &str) {
    std::fs::write(paths.catalog_dir.join(format!("{name}.toml")), content).unwrap();
}

fn catalog(ctx: &Context) -> GitCatalog {
    GitCatalog::new(DEFAULT_CATALOG, DEFAULT_CATALOG_BRANCH, &ctx.paths.catalog_dir)
}

fn manager(ctx: &Context) -> LinkManager {
    LinkManager::new(ctx.settings.link_dir.clone(), Path::new("/usr/local/bin/tether").to_path_buf())
}

#[cfg(test)]
mod resolve_tests {
    use super::*;

    #[test]
    fn test_version_block_and_output_substitution() {
        let (_dir, ctx) = setup_tests();
        let catalog = catalog(&ctx);
        let manifest = Resolver::new(&ctx, &catalog)
            .resolve("foo", Some("2.1.0"), None)
            .unwrap();

        let output = ctx.paths.package_dir("foo", "2.1.0");
        assert_eq!(manifest.output_dir, output);
        assert_eq!(manifest.options.source, format!("{}/download", output.display()));
        assert_eq!(manifest.options.extract, "unzip");
        assert_eq!(manifest.bin_names(), vec!["foo"]);
    }

    #[test]
    fn test_non_matching_block_does_not_leak() {
        let (_dir, ctx) = setup_tests();
        let catalog = catalog(&ctx);
        let manifest = Resolver::new(&ctx, &catalog).resolve("foo", None, None).unwrap();
        assert_eq!(manifest.version, "1.0.0");
        assert!(manifest.options.extract.is_empty());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let (_dir, ctx) = setup_tests();
        let catalog = catalog(&ctx);
        let resolver = Resolver::new(&ctx, &catalog);
        let first = resolver.resolve("node", None, None).unwrap();
        let second = resolver.resolve("node", None, None).unwrap();
        assert_eq!(first, second);
        assert!(first.options.source.contains("node-v18.17.0-"));
        assert_eq!(
            first.options.extract,
            format!(
                "tar -xzf - --strip-components=1 -C {}",
                shell_words::quote(&first.output_dir.display().to_string())
            )
        );
    }

    #[test]
    fn test_version_precedence() {
        let (_dir, mut ctx) = setup_tests();
        ctx.settings.pins.insert("foo".to_string(), "1.5.0".to_string());
        let catalog = catalog(&ctx);
        let resolver = Resolver::new(&ctx, &catalog);

        assert_eq!(resolver.resolve("foo", None, None).unwrap().version, "1.5.0");
        assert_eq!(resolver.resolve("foo", Some("2.0.0"), None).unwrap().version, "2.0.0");
    }

    #[test]
    fn test_overrides_take_precedence() {
        let (_dir, mut ctx) = setup_tests();
        ctx.settings.packages.insert(
            "bar".to_string(),
            PackageSettings {
                platform: Some("plan9-x64".to_string()),
                options: PackageOptions {
                    extract: "settings-extract".to_string(),
                    test: "bar --version".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        let catalog = catalog(&ctx);
        let caller = PackageOptions {
            extract: "caller-extract".to_string(),
            ..Default::default()
        };
        let manifest = Resolver::new(&ctx, &catalog)
            .resolve("bar", None, Some(&caller))
            .unwrap();

        assert_eq!(manifest.options.source, "https://example.com/bar-0.3.0-plan9-x64");
        assert_eq!(manifest.options.extract, "caller-extract");
        assert_eq!(manifest.options.test, "bar --version");
    }

    #[test]
    fn test_resolution_errors() {
        let (_dir, ctx) = setup_tests();
        let catalog = catalog(&ctx);
        let resolver = Resolver::new(&ctx, &catalog);

        assert!(matches!(
            resolver.resolve("ghost", None, None),
            Err(Error::PackageNotFound { .. })
        ));
        assert!(matches!(
            resolver.resolve("foo", Some("latest"), None),
            Err(Error::InvalidVersion { .. })
        ));

        write_manifest(&ctx.paths, "nosource", "name = \"nosource\"\nversion = \"1.0.0\"\n");
        assert!(matches!(
            resolver.resolve("nosource", None, None),
            Err(Error::IncompleteManifest { .. })
        ));

        write_manifest(&ctx.paths, "broken", "name = \"broken\"\nversion = [");
        assert!(matches!(
            resolver.resolve("broken", None, None),
            Err(Error::MalformedManifest { .. })
        ));
    }
}

#[cfg(test)]
mod link_tests {
    use super::*;

    #[test]
    fn test_link_conflict_only_stops_that_name() {
        let (_dir, ctx) = setup_tests();
        let catalog = catalog(&ctx);
        let manager = manager(&ctx);
        let bar = manager.link_path("bar");
        std::fs::create_dir_all(manager.link_dir()).unwrap();
        std::fs::write(&bar, "#!/bin/sh\necho my own bar\n").unwrap();

        let names = vec!["foo".to_string(), "bar".to_string()];
        let report = link_with(&ctx, &catalog, &manager, &names, false).unwrap();

        assert_eq!(report.paths, vec![manager.link_path("foo")]);
        assert_eq!(report.conflicts.len(), 1);
        assert!(matches!(&report.conflicts[0], Error::LinkConflict { path } if *path == bar));
        assert!(report.not_found.is_empty());
        assert_eq!(std::fs::read_to_string(&bar).unwrap(), "#!/bin/sh\necho my own bar\n");
        assert_eq!(link_state(&manager.link_path("foo")).unwrap(), LinkState::Owned);

        let report = link_with(&ctx, &catalog, &manager, &names, true).unwrap();
        assert_eq!(report.failures(), 0);
        assert_eq!(link_state(&bar).unwrap(), LinkState::Owned);
    }

    #[test]
    fn test_forced_batch_continues_past_directory() {
        let (_dir, ctx) = setup_tests();
        let catalog = catalog(&ctx);
        let manager = manager(&ctx);
        let bar = manager.link_path("bar");
        std::fs::create_dir_all(&bar).unwrap();

        let names = vec!["bar".to_string(), "foo".to_string()];
        let report = link_with(&ctx, &catalog, &manager, &names, true).unwrap();
        assert_eq!(report.paths, vec![manager.link_path("foo")]);
        assert!(matches!(&report.conflicts[..], [Error::LinkBlocked { path }] if *path == bar));
        assert!(bar.is_dir());

        let report = unlink_with(&ctx, &catalog, &manager, &names, true).unwrap();
        assert_eq!(report.paths, vec![manager.link_path("foo")]);
        assert_eq!(report.failures(), 1);
    }

    #[test]
    fn test_link_writes_one_script_per_bin() {
        let (_dir, ctx) = setup_tests();
        let catalog = catalog(&ctx);
        let manager = manager(&ctx);
        let report = link_with(&ctx, &catalog, &manager, &["node".to_string()], false).unwrap();

        assert_eq!(report.paths, vec![manager.link_path("node"), manager.link_path("npm")]);
        let npm = std::fs::read_to_string(manager.link_path("npm")).unwrap();
        assert!(npm.contains("package=node bin=npm"));
    }

    #[test]
    fn test_unknown_package_is_linked_and_counted() {
        let (_dir, ctx) = setup_tests();
        let catalog = catalog(&ctx);
        let manager = manager(&ctx);
        let report = link_with(&ctx, &catalog, &manager, &["ghost".to_string()], false).unwrap();

        assert_eq!(report.not_found, vec!["ghost"]);
        assert_eq!(report.failures(), 1);
        assert!(manager.link_path("ghost").exists());
    }

    #[test]
    fn test_unlink_batch() {
        let (_dir, ctx) = setup_tests();
        let catalog = catalog(&ctx);
        let manager = manager(&ctx);
        link_with(&ctx, &catalog, &manager, &["node".to_string()], false).unwrap();
        let mine = manager.link_path("mine");
        std::fs::write(&mine, "user tool\n").unwrap();

        let names = vec!["node".to_string(), "mine".to_string(), "missing".to_string()];
        let report = unlink_with(&ctx, &catalog, &manager, &names, false).unwrap();
        assert_eq!(report.paths.len(), 2);
        assert_eq!(report.conflicts.len(), 1);
        assert!(!manager.link_path("npm").exists());
        assert!(mine.exists());

        let report = unlink_with(&ctx, &catalog, &manager, &["mine".to_string()], true).unwrap();
        assert_eq!(report.paths, vec![mine.clone()]);
        assert!(!mine.exists());
    }
}

#[cfg(all(test, unix))]
mod run_tests {
    use super::*;
    use mockito::Server;

    const TOOL: &str = "#!/bin/sh\necho \"$@\" > out.txt\n";

    #[test]
    fn test_run_fetches_once_then_reuses_install() {
        let (_dir, ctx) = setup_tests();
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/mytool-1.2.0")
            .with_body(TOOL)
            .expect(1)
            .create();
        write_manifest(
            &ctx.paths,
            "mytool",
            &format!("name = \"mytool\"\nversion = \"1.2.0\"\nsource = \"{}/mytool-${{version}}\"\n", server.url()),
        );
        let catalog = catalog(&ctx);
        let args = vec!["--flag".to_string()];

        let status = run_with(&ctx, &catalog, "mytool", None, None, &args).unwrap();
        assert!(status.success());
        let out = ctx.paths.working_dir.join("out.txt");
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "--flag\n");
        assert!(ctx.paths.package_dir("mytool", "1.2.0").join("mytool").exists());

        std::fs::remove_file(&out).unwrap();
        let status = run_with(&ctx, &catalog, "mytool", Some("1.2.0"), None, &args).unwrap();
        assert!(status.success());
        assert!(out.exists());
        mock.assert();
    }

    #[test]
    fn test_run_through_external_invoker() {
        let (_dir, ctx) = setup_tests();
        let mut server = Server::new();
        let _mock = server.mock("GET", "/script.sh").with_body(TOOL).create();
        write_manifest(
            &ctx.paths,
            "scripted",
            &format!(
                r#"
name = "scripted"
version = "0.1.0"
source = "{}/script.sh"
extract = "sh -c 'cat > ${{output}}/tool.sh'"
exec = "sh"
bins = {{ scripted = "tool.sh" }}
"#,
                server.url()
            ),
        );
        let catalog = catalog(&ctx);

        let status = run_with(&ctx, &catalog, "scripted", None, None, &["a".to_string(), "b".to_string()]).unwrap();
        assert!(status.success());
        assert_eq!(
            std::fs::read_to_string(ctx.paths.working_dir.join("out.txt")).unwrap(),
            "a b\n"
        );
    }

    #[test]
    fn test_extract_into_output_dir_with_space() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("John Doe");
        let work = root.join("work");
        std::fs::create_dir_all(&work).unwrap();
        let paths = Paths::from_dirs(work, root.join("home"), None, root.join("tmp"));
        let settings = Settings::from_files(vec![], &paths).unwrap();
        let ctx = Context::new(paths, settings);
        std::fs::create_dir_all(&ctx.paths.catalog_dir).unwrap();

        let mut server = Server::new();
        let _mock = server.mock("GET", "/tool").with_body(TOOL).create();
        write_manifest(
            &ctx.paths,
            "tool",
            &format!(
                "name = \"tool\"\nversion = \"1.0.0\"\nsource = \"{}/tool\"\nextract = \"tee ${{output}}/tool\"\n",
                server.url()
            ),
        );
        let manifest = Resolver::new(&ctx, &catalog(&ctx))
            .resolve("tool", None, None)
            .unwrap();

        let bin = ensure(&ctx, &manifest, "tool").unwrap();
        assert_eq!(bin, manifest.output_dir.join("tool"));
        assert_eq!(std::fs::read_to_string(&bin).unwrap(), TOOL);
    }

    #[test]
    fn test_child_exit_status_passes_through() {
        let (_dir, ctx) = setup_tests();
        let output = ctx.paths.package_dir("bar", "0.3.0");
        std::fs::create_dir_all(&output).unwrap();
        std::fs::write(output.join("bar"), "#!/bin/sh\nexit 7\n").unwrap();
        tether::util::set_executable(&output.join("bar")).unwrap();

        let status = run_with(&ctx, &catalog(&ctx), "bar", None, None, &[]).unwrap();
        assert_eq!(status.code(), Some(7));
    }
}

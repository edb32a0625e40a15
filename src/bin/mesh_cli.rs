#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!(
        "mesh_cli requires `--features cli`.\n\
         Example: cargo run --bin mesh_cli --features cli -- list"
    );
    std::process::exit(1);
}

#[cfg(feature = "cli")]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(err) = native::run() {
        eprintln!("mesh_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
mod native {
    use facemesh_engine::geom::{
        BezierSurface, CarrierSurface, CylinderSurface, NurbsSurface, Point3, UvDomain, UvPoint, Vec3,
        bspline::clamped_uniform_knots,
    };
    use facemesh_engine::mesher::{FaceMesh, FaceMeshDiagnostics, MeshReport, MesherConfig, mesh_topology};
    use facemesh_engine::topo::TopoModel;
    use std::fmt::Write as _;
    use std::fs::{self, File};
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};

    const SNAPSHOT_QUANTIZE: f64 = 1e-6;
    const SNAPSHOT_DECIMALS: usize = 6;

    const USAGE: &str = r#"mesh_cli (facemesh-engine)

USAGE:
  mesh_cli list
  mesh_cli run <scenario|all> [options]

SCENARIOS:
  planar_square
  square_with_hole
  half_cylinder
  bezier_dome
  thin_strip
  adjacent_patches

OPTIONS (run):
  --config <path>    Read a JSON mesher configuration (missing fields use defaults)
  --no-planar        Disable the planar fast path
  --out-dir <dir>    Write <scenario>.obj and <scenario>.snap to this dir (required for `all`)
  --obj <path>       Write OBJ (single scenario only)
  --snap <path>      Write snapshot (single scenario only)
  --no-obj           Skip OBJ when using --out-dir
  --no-snap          Skip snapshot when using --out-dir
  --overwrite        Overwrite existing output files
  -h, --help         Show this help

Logging follows RUST_LOG (default: warn).
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                for scenario in Scenario::ALL {
                    println!("{}", scenario.name());
                }
                Ok(())
            }
            "run" => cmd_run(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let scenario_name = args.next().ok_or("missing scenario name")?;

        let mut config_path: Option<PathBuf> = None;
        let mut out_dir: Option<PathBuf> = None;
        let mut obj_path: Option<PathBuf> = None;
        let mut snap_path: Option<PathBuf> = None;
        let mut overwrite = false;
        let mut no_planar = false;
        let mut write_obj = true;
        let mut write_snap = true;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => config_path = Some(PathBuf::from(args.value("--config")?)),
                "--out-dir" => out_dir = Some(PathBuf::from(args.value("--out-dir")?)),
                "--obj" => obj_path = Some(PathBuf::from(args.value("--obj")?)),
                "--snap" => snap_path = Some(PathBuf::from(args.value("--snap")?)),
                "--overwrite" => overwrite = true,
                "--no-planar" => no_planar = true,
                "--no-obj" => write_obj = false,
                "--no-snap" => write_snap = false,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let base = match config_path.as_deref() {
            Some(path) => read_config(path)?,
            None => None,
        };

        if let Some(dir) = out_dir.as_ref() {
            if obj_path.is_some() || snap_path.is_some() {
                return Err("use either --out-dir or --obj/--snap (not both)".to_string());
            }
            if !write_obj && !write_snap {
                return Err("nothing to write (both --no-obj and --no-snap set)".to_string());
            }
            fs::create_dir_all(dir).map_err(|e| format!("create out dir: {e}"))?;

            let scenarios: Vec<Scenario> = if scenario_name == "all" {
                Scenario::ALL.to_vec()
            } else {
                vec![Scenario::from_str(&scenario_name).ok_or_else(|| unknown_scenario(&scenario_name))?]
            };
            for scenario in scenarios {
                let output = run_scenario(scenario, base.as_ref(), no_planar)?;
                if write_snap {
                    let path = dir.join(format!("{}.snap", output.name));
                    write_text_file(&path, &output.snapshot, overwrite)?;
                    eprintln!("wrote {}", path.display());
                }
                if write_obj {
                    let path = dir.join(format!("{}.obj", output.name));
                    write_obj_file(&path, &output.report, output.name, overwrite)?;
                    eprintln!("wrote {}", path.display());
                }
                report_summary(&output);
            }
            return Ok(());
        }

        if scenario_name == "all" {
            return Err("`run all` requires --out-dir".to_string());
        }

        let scenario = Scenario::from_str(&scenario_name).ok_or_else(|| unknown_scenario(&scenario_name))?;
        let output = run_scenario(scenario, base.as_ref(), no_planar)?;

        if let Some(path) = snap_path.as_deref() {
            write_text_file(path, &output.snapshot, overwrite)?;
            eprintln!("wrote {}", path.display());
        } else {
            print!("{}", output.snapshot);
        }
        if let Some(path) = obj_path.as_deref() {
            write_obj_file(path, &output.report, output.name, overwrite)?;
            eprintln!("wrote {}", path.display());
        }
        report_summary(&output);
        Ok(())
    }

    fn read_config(path: &Path) -> Result<Option<MesherConfig>, String> {
        let text = fs::read_to_string(path).map_err(|e| format!("read {}: {e}", path.display()))?;
        serde_json::from_str(&text).map(Some).map_err(|e| format!("parse {}: {e}", path.display()))
    }

    fn report_summary(output: &ScenarioOutput) {
        eprintln!(
            "{}: waves={} nodes={} | {}",
            output.name,
            output.report.wave_count,
            output.report.mesh.node_count(),
            output.report.diagnostics.summary()
        );
    }

    fn unknown_scenario(name: &str) -> String {
        let mut msg = format!("unknown scenario `{name}`\n\navailable scenarios:\n");
        for scenario in Scenario::ALL {
            let _ = writeln!(msg, "  {}", scenario.name());
        }
        msg
    }

    fn write_text_file(path: &Path, text: &str, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!("refusing to overwrite existing file {} (use --overwrite)", path.display()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        let text = if text.ends_with('\n') { text.to_string() } else { format!("{text}\n") };
        fs::write(path, text).map_err(|e| format!("write {}: {e}", path.display()))
    }

    /// One OBJ object per face; vertices are numbered globally across faces.
    fn write_obj_file(path: &Path, report: &MeshReport, name: &str, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!("refusing to overwrite existing file {} (use --overwrite)", path.display()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }

        let file = File::create(path).map_err(|e| format!("create {}: {e}", path.display()))?;
        let mut w = BufWriter::new(file);
        let err = |e: std::io::Error| format!("write obj: {e}");

        writeln!(w, "# facemesh-engine mesh_cli").map_err(err)?;
        let mut offset = 1;
        for mesh in report.mesh.face_meshes() {
            let label = mesh.face.map_or_else(|| "face".to_string(), |f| f.to_string());
            writeln!(w, "o {name}_{label}").map_err(err)?;
            for p in &mesh.positions {
                writeln!(w, "v {} {} {}", p.x, p.y, p.z).map_err(err)?;
            }
            for uv in &mesh.uvs {
                writeln!(w, "vt {} {}", uv.u, uv.v).map_err(err)?;
            }
            for n in &mesh.normals {
                writeln!(w, "vn {} {} {}", n.x, n.y, n.z).map_err(err)?;
            }
            for tri in &mesh.triangles {
                let [a, b, c] = tri.map(|i| i as usize + offset);
                writeln!(w, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}").map_err(err)?;
            }
            offset += mesh.positions.len();
        }
        w.flush().map_err(|e| format!("flush {}: {e}", path.display()))
    }

    fn quantize_f64(value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let q = (value / SNAPSHOT_QUANTIZE).round() * SNAPSHOT_QUANTIZE;
        if q == 0.0 { 0.0 } else { q }
    }

    fn write_f64_line(out: &mut String, key: &str, value: f64) {
        let value = quantize_f64(value);
        let _ = writeln!(out, "{key} {value:.SNAPSHOT_DECIMALS$}");
    }

    fn write_diagnostics(out: &mut String, diag: &FaceMeshDiagnostics) {
        let _ = writeln!(out, "diag.face_count {}", diag.face_count);
        let _ = writeln!(out, "diag.vertex_count {}", diag.vertex_count);
        let _ = writeln!(out, "diag.triangle_count {}", diag.triangle_count);
        let _ = writeln!(out, "diag.cutting_point_count {}", diag.cutting_point_count);
        let _ = writeln!(out, "diag.grid_node_count {}", diag.grid_node_count);
        let _ = writeln!(out, "diag.inside_node_count {}", diag.inside_node_count);
        let _ = writeln!(out, "diag.too_close_node_count {}", diag.too_close_node_count);
        let _ = writeln!(out, "diag.thin_zone_count {}", diag.thin_zone_count);
        let _ = writeln!(out, "diag.planar_face_count {}", diag.planar_face_count);
        let _ = writeln!(out, "diag.culled_triangle_count {}", diag.culled_triangle_count);
        let _ = writeln!(out, "diag.failed_face_count {}", diag.failed_face_count());
        let _ = writeln!(out, "diag.warning_count {}", diag.warnings.len());
        for (idx, warning) in diag.warnings.iter().enumerate() {
            let _ = writeln!(out, "diag.warning.{idx} {warning}");
        }
    }

    fn snapshot(name: &str, report: &MeshReport) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "scenario {name}");
        let _ = writeln!(out, "wave_count {}", report.wave_count);
        let _ = writeln!(out, "node_count {}", report.mesh.node_count());
        for (face, state) in &report.faces {
            let _ = writeln!(out, "face.{face} {state:?}");
        }
        let meshes = report.mesh.face_meshes();
        write_f64_line(&mut out, "area", meshes.iter().map(FaceMesh::area).sum());
        write_diagnostics(&mut out, &report.diagnostics);
        out
    }

    #[derive(Debug, Clone, Copy)]
    enum Scenario {
        PlanarSquare,
        SquareWithHole,
        HalfCylinder,
        BezierDome,
        ThinStrip,
        AdjacentPatches,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[
            Scenario::PlanarSquare,
            Scenario::SquareWithHole,
            Scenario::HalfCylinder,
            Scenario::BezierDome,
            Scenario::ThinStrip,
            Scenario::AdjacentPatches,
        ];

        fn name(self) -> &'static str {
            match self {
                Scenario::PlanarSquare => "planar_square",
                Scenario::SquareWithHole => "square_with_hole",
                Scenario::HalfCylinder => "half_cylinder",
                Scenario::BezierDome => "bezier_dome",
                Scenario::ThinStrip => "thin_strip",
                Scenario::AdjacentPatches => "adjacent_patches",
            }
        }

        fn from_str(name: &str) -> Option<Self> {
            Scenario::ALL.iter().copied().find(|s| s.name() == name)
        }

        /// Configuration used when no `--config` file is given.
        fn default_config(self) -> MesherConfig {
            match self {
                Scenario::PlanarSquare => MesherConfig::default(),
                Scenario::SquareWithHole | Scenario::ThinStrip | Scenario::AdjacentPatches => {
                    MesherConfig::default().with_max_edge_length(0.1)
                }
                Scenario::HalfCylinder | Scenario::BezierDome => MesherConfig::default().with_max_edge_length(0.2),
            }
        }
    }

    struct ScenarioOutput {
        name: &'static str,
        report: MeshReport,
        snapshot: String,
    }

    fn run_scenario(
        scenario: Scenario,
        config: Option<&MesherConfig>,
        no_planar: bool,
    ) -> Result<ScenarioOutput, String> {
        let mut model = build_model(scenario).map_err(|e| format!("{}: {e}", scenario.name()))?;
        let mut config = config.cloned().unwrap_or_else(|| scenario.default_config());
        if no_planar {
            config.detect_planar = false;
        }
        let report = mesh_topology(&mut model, &config).map_err(|e| format!("{}: {e}", scenario.name()))?;
        let snapshot = snapshot(scenario.name(), &report);
        Ok(ScenarioOutput { name: scenario.name(), report, snapshot })
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<UvPoint> {
        vec![UvPoint::new(x0, y0), UvPoint::new(x1, y0), UvPoint::new(x1, y1), UvPoint::new(x0, y1)]
    }

    fn build_model(scenario: Scenario) -> Result<TopoModel, Box<dyn std::error::Error>> {
        let mut model = TopoModel::new(1e-6);
        match scenario {
            Scenario::PlanarSquare => {
                let s = model.add_surface(unit_patch());
                model.add_polygon_face(s, &square(0.0, 0.0, 1.0, 1.0), &[])?;
            }
            Scenario::SquareWithHole => {
                let s = model.add_surface(unit_patch());
                let mut hole = square(0.35, 0.35, 0.65, 0.65);
                hole.reverse();
                model.add_polygon_face(s, &square(0.0, 0.0, 1.0, 1.0), &[hole])?;
            }
            Scenario::HalfCylinder => {
                let pi = std::f64::consts::PI;
                let cylinder = CylinderSurface::new(
                    Point3::ORIGIN,
                    Vec3::Z,
                    Vec3::new(1.0, 0.0, 0.0),
                    1.0,
                    UvDomain::new(0.0, pi, 0.0, 2.0),
                )?;
                let s = model.add_surface(CarrierSurface::Cylinder(cylinder));
                model.add_polygon_face(s, &square(0.0, 0.0, pi, 2.0), &[])?;
            }
            Scenario::BezierDome => {
                let s = model.add_surface(CarrierSurface::Bezier(dome()?));
                model.add_polygon_face(s, &square(0.0, 0.0, 1.0, 1.0), &[])?;
            }
            Scenario::ThinStrip => {
                let s = model.add_surface(CarrierSurface::Bezier(dome()?));
                model.add_polygon_face(s, &square(0.05, 0.48, 0.95, 0.52), &[])?;
            }
            Scenario::AdjacentPatches => {
                let knots = clamped_uniform_knots(3, 2);
                let poles = (0..3)
                    .flat_map(|j| {
                        (0..3).map(move |i| {
                            let z = if i == 1 && j == 1 { 0.5 } else { 0.0 };
                            Point3::new(f64::from(i), f64::from(j), z)
                        })
                    })
                    .collect();
                let nurbs = NurbsSurface::new(2, 2, 3, 3, knots.clone(), knots, poles, None)?;
                let s = model.add_surface(CarrierSurface::Nurbs(nurbs));
                model.add_polygon_face(s, &square(0.0, 0.0, 0.5, 1.0), &[])?;
                model.add_polygon_face(s, &square(0.5, 0.0, 1.0, 1.0), &[])?;
            }
        }
        Ok(model)
    }

    fn unit_patch() -> CarrierSurface {
        CarrierSurface::Bezier(BezierSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ))
    }

    fn dome() -> Result<BezierSurface, facemesh_engine::geom::SurfaceError> {
        let poles = (0..3)
            .flat_map(|j| {
                (0..3).map(move |i| {
                    let z = if i == 1 && j == 1 { 1.0 } else { 0.0 };
                    Point3::new(f64::from(i) * 0.5, f64::from(j) * 0.5, z)
                })
            })
            .collect();
        BezierSurface::new(2, 2, poles)
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next().ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}

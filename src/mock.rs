//! Synthetic sources for the end to end tests
//!
//! A mock source is a Gaussian ring seen with a fixed geometry. All the pipeline inputs
//! are written to a temporary directory laid out as `<root>/disks/<disk>/<clean, rave, frank>`.

use std::{
    f64::consts::PI,
    fs,
    path::{Path, PathBuf},
};

use rustfft::num_complex::Complex64;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::{
    config::{Model, ParameterFiles},
    fits::{write_image, Beam},
    geometry::Geometry,
    hankel,
    image::Image,
    radial::linspace,
    table::{NpyArray, Table},
    units::{beam_solid_angle, pixel_solid_angle, ARCSEC2_PER_STERAD},
    uvtable::UvTable,
};

const NPIX: usize = 64;
const PIXEL_SCALE: f64 = 0.05;
const BEAM: Beam = Beam {
    bmaj: 0.2,
    bmin: 0.2,
    bpa: 0.,
};
/// ring peak brightness [Jy/sr]
const PEAK: f64 = 1e8;
const RING_WIDTH: f64 = 0.1;

fn edit_json<F: FnOnce(&mut Value)>(path: &Path, edit: F) {
    let mut value: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    edit(&mut value);
    fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

pub struct MockSourceBuilder {
    sources: usize,
}
impl MockSourceBuilder {
    pub fn sources(self, sources: usize) -> Self {
        Self { sources }
    }
    pub fn build(self) -> MockSource {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let disks: Vec<String> = (0..self.sources.max(1))
            .map(|k| format!("mock{}", k))
            .collect();
        let source = MockSource {
            disk: disks[0].clone(),
            files: ParameterFiles::new(
                root.join("gen_pars.json"),
                root.join("source_pars.json"),
                root.join("phys_pars.csv"),
            ),
            root,
            disks,
            geometry: Geometry::new(40., 120., 0., 0.),
            dist: 50.,
            mcmc_fstar_mjy: 0.025,
            ring_radius: 0.8,
            rave_points: 40,
            rave_npix: 32,
            _dir: dir,
        };
        source.write_parameters();
        for disk in &source.disks {
            source.write_products(disk);
        }
        source
    }
}

pub struct MockSource {
    pub root: PathBuf,
    /// first source
    pub disk: String,
    pub disks: Vec<String>,
    pub files: ParameterFiles,
    pub geometry: Geometry,
    /// [pc]
    pub dist: f64,
    pub mcmc_fstar_mjy: f64,
    /// [arcsec]
    pub ring_radius: f64,
    pub rave_points: usize,
    pub rave_npix: usize,
    _dir: TempDir,
}
impl MockSource {
    pub fn builder() -> MockSourceBuilder {
        MockSourceBuilder { sources: 1 }
    }
    /// Model of the first source
    pub fn model(&self) -> Model {
        Model::setup(&self.files, &self.disk).unwrap()
    }
    /// Ring brightness [Jy/sr]
    pub fn ring(&self, r: f64) -> f64 {
        PEAK * (-0.5 * ((r - self.ring_radius) / RING_WIDTH).powi(2)).exp()
    }
    /// Rewrites the general parameters file
    pub fn edit_general<F: FnOnce(&mut Value)>(&self, edit: F) {
        edit_json(&self.files.general, edit);
    }
    /// Rewrites the parameters of `disk` in the per-source parameters file
    pub fn edit_source<F: FnOnce(&mut Value)>(&self, disk: &str, edit: F) {
        edit_json(&self.files.source, |sources| edit(&mut sources[disk]));
    }
    fn write_parameters(&self) {
        let general = json!({
            "base": {
                "save_dir": "",
                "output_dir": "",
                "extract_clean_profile": true,
                "process_rave_fit": true,
                "compare_models_fig": true,
                "include_rave": true
            },
            "clean": {"robust": 2.0, "rmax": 1.5, "Nr": 30, "Nphi": 20},
            "frank": {
                "set_fstar": "MCMC",
                "method": "LogNormal",
                "max_iter": 2000,
                "scale_heights": null,
                "Rmax": 1.5,
                "N": 50
            },
            "plot": {"bin_widths": [5e4, 1e5]}
        });
        fs::write(
            &self.files.general,
            serde_json::to_string_pretty(&general).unwrap(),
        )
        .unwrap();

        let mut sources = serde_json::Map::new();
        let mut physical = String::from("name,dpc,Lstar,Mstar\n");
        for disk in &self.disks {
            sources.insert(
                disk.clone(),
                json!({
                    "base": {"SMG_sub": false},
                    "clean": {
                        "npix": NPIX,
                        "pixel_scale": PIXEL_SCALE,
                        "image_rms": 1e-5,
                        "bestfit_robust": 0.5
                    },
                    "rave": {"pixel_scale": PIXEL_SCALE, "N": 7},
                    "frank": {
                        "bestfit": {"alpha": 1.3, "wsmooth": 1e-4, "method": "LogNormal"},
                        "custom_fstar": 20.0,
                        "SED_fstar": 30.0
                    }
                }),
            );
            physical.push_str(&format!("{}, {}, 1.5, 1.2\n", disk, self.dist));
        }
        fs::write(
            &self.files.source,
            serde_json::to_string_pretty(&sources).unwrap(),
        )
        .unwrap();
        fs::write(&self.files.physical, physical).unwrap();
    }
    fn write_products(&self, disk: &str) {
        let save_dir = self.root.join("disks").join(disk);
        for dir in ["clean", "rave", "frank"] {
            fs::create_dir_all(save_dir.join(dir)).unwrap();
        }
        let mcmc = json!({
            "i": {"median": self.geometry.inc, "std": 1.0},
            "PA": {"median": self.geometry.pa, "std": 1.0},
            "deltaRA-12m.obs1": {"median": self.geometry.dra},
            "deltaDec-12m.obs1": {"median": self.geometry.ddec},
            "fstar": {"median": self.mcmc_fstar_mjy}
        });
        fs::write(
            save_dir.join(crate::config::MCMC_RESULTS),
            serde_json::to_string_pretty(&mcmc).unwrap(),
        )
        .unwrap();

        let model = Model::setup(&self.files, disk).unwrap();
        for robust in [0.5, 2.0] {
            let model = model.with_robust(robust);
            self.write_clean_images(&model);
            self.write_rave_fit(&model);
        }
        self.write_frank_products(&model);
    }
    /// Sky image of the ring in units of `scale` times Jy/sr
    fn sky(&self, npix: usize, pixel_scale: f64, scale: f64) -> Image {
        let deprojection = self.geometry.deprojection();
        let blank = Image::from_fn(npix, npix, |_, _| 0.);
        Image::from_fn(npix, npix, |i, j| {
            let (r, _) = deprojection.apply(
                blank.x_offset(j, pixel_scale),
                blank.y_offset(i, pixel_scale),
            );
            scale * self.ring(r)
        })
    }
    fn write_clean_images(&self, model: &Model) {
        let pbcor = self.sky(NPIX, PIXEL_SCALE, beam_solid_angle(BEAM.bmaj, BEAM.bmin));
        write_image(model.clean_fits("pbcor"), &pbcor, Some(BEAM)).unwrap();
        let clean_model = self.sky(NPIX, PIXEL_SCALE, pixel_solid_angle(PIXEL_SCALE));
        write_image(model.clean_fits("model"), &clean_model, None).unwrap();
        let pb = Image::from_fn(NPIX, NPIX, |i, j| {
            let x = pbcor.x_offset(j, PIXEL_SCALE);
            let y = pbcor.y_offset(i, PIXEL_SCALE);
            (-(x * x + y * y) / 50.).exp()
        });
        write_image(model.clean_fits("pb"), &pb, None).unwrap();
    }
    fn write_rave_fit(&self, model: &Model) {
        let r = linspace(0.0375, 1.5, self.rave_points);
        let intensity: Vec<f64> = r
            .iter()
            .map(|&r| self.ring(r) / ARCSEC2_PER_STERAD)
            .collect();
        let peak = PEAK / ARCSEC2_PER_STERAD;
        let mut data = r.clone();
        data.extend(intensity.iter().map(|i| i - 0.05 * peak));
        data.extend(&intensity);
        data.extend(intensity.iter().map(|i| i + 0.08 * peak));
        NpyArray {
            shape: vec![4, self.rave_points],
            data,
        }
        .save(model.rave_fit_path())
        .unwrap();

        let n = self.rave_npix;
        let residuals = Image::from_fn(n, n, |i, j| {
            1e-6 * ((i as f64 * 0.7).sin() + (j as f64 * 0.3).cos())
        });
        NpyArray {
            shape: vec![n, n],
            data: residuals.to_row_major(),
        }
        .save(model.rave_residual_path())
        .unwrap();
    }
    fn write_frank_products(&self, model: &Model) {
        // fine radial sampling of the ring for the visibilities
        let r_fine = linspace(0.005, 2.0, 400);
        let i_fine: Vec<f64> = r_fine.iter().map(|&r| self.ring(r)).collect();

        let n = model.frank.n;
        let r: Vec<f64> = (0..n)
            .map(|k| (k as f64 + 0.5) * model.frank.rmax / n as f64)
            .collect();
        let intensity: Vec<f64> = r.iter().map(|&r| self.ring(r)).collect();
        Table::new(
            "r [arcsec]\tI [Jy/sr]\tI_err [Jy/sr]",
            vec![r, intensity, vec![0.03 * PEAK; n]],
        )
        .unwrap()
        .write(model.frank_product("frank_profile_fit.txt"))
        .unwrap();

        let grid = linspace(1e3, 2.5e6, 300);
        let vis = hankel::transform(&r_fine, &i_fine, &grid);
        Table::new("Baseline [lambda]\tRe(V) [Jy]", vec![grid, vis])
            .unwrap()
            .write(model.frank_product("frank_vis_fit.txt"))
            .unwrap();

        // observed baselines, deterministic and well spread in the uv plane
        let (u, v): (Vec<f64>, Vec<f64>) = (0..200)
            .map(|k| {
                let q = 2e4 + 1.4e6 * (k as f64 * 0.618_033_988_7).fract();
                let theta = 2. * PI * (k as f64 * 0.414_213_562_4).fract();
                (q * theta.cos(), q * theta.sin())
            })
            .unzip();
        let ones = vec![Complex64::new(1., 0.); u.len()];
        let (up, vp, _) = self.geometry.deproject_vis(&u, &v, &ones);
        let q: Vec<f64> = up.iter().zip(&vp).map(|(u, v)| u.hypot(*v)).collect();
        let cos_inc = self.geometry.inc.to_radians().cos();
        let model_vis: Vec<f64> = hankel::transform(&r_fine, &i_fine, &q)
            .into_iter()
            .map(|v| v * cos_inc)
            .collect();
        let weights: Vec<f64> = (0..u.len()).map(|k| 1e4 * (1. + (k % 3) as f64)).collect();

        UvTable::new(
            u.clone(),
            v.clone(),
            model_vis.iter().map(|&v| Complex64::new(v, 0.)).collect(),
            weights.clone(),
        )
        .unwrap()
        .save_npz(model.visibilities_path())
        .unwrap();
        UvTable::new(
            u,
            v,
            model_vis
                .iter()
                .enumerate()
                .map(|(k, &v)| Complex64::new(0.02 * v * (k as f64).sin(), 1e-5))
                .collect(),
            weights,
        )
        .unwrap()
        .save_npz(model.frank_product("frank_uv_resid.npz"))
        .unwrap();
    }
}
